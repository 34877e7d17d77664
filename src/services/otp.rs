use rand::Rng;

/// Source of one-time codes for confirmation, MFA and attribute
/// verification challenges.
pub trait OtpGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random 4-digit codes, matching the `{####}` message template slot.
pub struct RandomOtp;

impl OtpGenerator for RandomOtp {
    fn generate(&self) -> String {
        rand::thread_rng().gen_range(1000..=9999).to_string()
    }
}
