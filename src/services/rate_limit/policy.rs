//! Static per-endpoint-class limits.

use std::net::IpAddr;
use std::time::Duration;

use serde_json::Value;

use crate::services::rate_limit::key;

/// Body field whose presence lets a client skip a captcha-bypassable limit.
/// Only presence is checked here; the token itself is verified further down the stack.
pub const ALTERNATE_PROOF_FIELD: &str = "recaptchaToken";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    ClientIp,
    ClientIpAndEmail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipWhen {
    Never,
    AlternateProofPresent,
}

/// What the limiter needs to know about a request.
#[derive(Debug, Clone, Copy)]
pub struct LimitRequest<'a> {
    pub client_ip: Option<IpAddr>,
    pub body: Option<&'a Value>,
}

impl LimitRequest<'_> {
    fn body_str(&self, field: &str) -> Option<&str> {
        self.body?.get(field)?.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub window: Duration,
    pub max_attempts: u64,
    pub key_strategy: KeyStrategy,
    pub skip: SkipWhen,
    pub skip_successful_requests: bool,
    pub message: &'static str,
    pub requires_recaptcha: bool,
}

const FIFTEEN_MINUTES: Duration = Duration::from_millis(900_000);
const ONE_HOUR: Duration = Duration::from_millis(3_600_000);

impl RateLimitPolicy {
    pub const LOGIN: Self = Self {
        name: "login",
        window: FIFTEEN_MINUTES,
        max_attempts: 5,
        key_strategy: KeyStrategy::ClientIp,
        skip: SkipWhen::AlternateProofPresent,
        skip_successful_requests: false,
        message: "Too many login attempts. Please complete the captcha or try again in 15 minutes.",
        requires_recaptcha: true,
    };

    pub const PASSWORD_RESET: Self = Self {
        name: "password-reset",
        window: ONE_HOUR,
        max_attempts: 3,
        key_strategy: KeyStrategy::ClientIp,
        skip: SkipWhen::Never,
        skip_successful_requests: false,
        message: "Too many password reset requests. Please try again in an hour.",
        requires_recaptcha: false,
    };

    pub const CHANGE_PASSWORD: Self = Self {
        name: "change-password",
        window: FIFTEEN_MINUTES,
        max_attempts: 5,
        key_strategy: KeyStrategy::ClientIp,
        skip: SkipWhen::AlternateProofPresent,
        skip_successful_requests: false,
        message: "Too many password change attempts. Please complete the captcha or try again in 15 minutes.",
        requires_recaptcha: true,
    };

    pub const REGISTRATION: Self = Self {
        name: "registration",
        window: FIFTEEN_MINUTES,
        max_attempts: 5,
        key_strategy: KeyStrategy::ClientIpAndEmail,
        skip: SkipWhen::Never,
        skip_successful_requests: false,
        message: "Too many registration attempts. Please try again in 15 minutes.",
        requires_recaptcha: false,
    };

    pub const OTP_VERIFY: Self = Self {
        name: "otp-verify",
        window: FIFTEEN_MINUTES,
        max_attempts: 5,
        key_strategy: KeyStrategy::ClientIp,
        skip: SkipWhen::Never,
        skip_successful_requests: false,
        message: "Too many verification attempts. Please try again in 15 minutes.",
        requires_recaptcha: false,
    };

    pub const RESEND_OTP: Self = Self {
        name: "resend-otp",
        window: ONE_HOUR,
        max_attempts: 3,
        key_strategy: KeyStrategy::ClientIp,
        skip: SkipWhen::Never,
        skip_successful_requests: false,
        message: "Too many code requests. Please try again in an hour.",
        requires_recaptcha: false,
    };

    pub const RESEND_VERIFICATION: Self = Self {
        name: "resend-verification",
        window: ONE_HOUR,
        max_attempts: 3,
        key_strategy: KeyStrategy::ClientIp,
        skip: SkipWhen::Never,
        skip_successful_requests: false,
        message: "Too many verification emails requested. Please try again in an hour.",
        requires_recaptcha: false,
    };

    pub const SENSITIVE_DATA: Self = Self {
        name: "sensitive-data",
        window: FIFTEEN_MINUTES,
        max_attempts: 100,
        key_strategy: KeyStrategy::ClientIp,
        skip: SkipWhen::Never,
        skip_successful_requests: false,
        message: "Too many requests for sensitive data. Please slow down.",
        requires_recaptcha: false,
    };

    pub const ALL: [&'static Self; 8] = [
        &Self::LOGIN,
        &Self::PASSWORD_RESET,
        &Self::CHANGE_PASSWORD,
        &Self::REGISTRATION,
        &Self::OTP_VERIFY,
        &Self::RESEND_OTP,
        &Self::RESEND_VERIFICATION,
        &Self::SENSITIVE_DATA,
    ];

    /// Whether the policy needs the JSON body to decide (skip predicate or email key).
    pub fn reads_body(&self) -> bool {
        self.skip == SkipWhen::AlternateProofPresent
            || self.key_strategy == KeyStrategy::ClientIpAndEmail
    }

    pub fn should_skip(&self, req: &LimitRequest<'_>) -> bool {
        match self.skip {
            SkipWhen::Never => false,
            SkipWhen::AlternateProofPresent => req
                .body_str(ALTERNATE_PROOF_FIELD)
                .is_some_and(|token| !token.trim().is_empty()),
        }
    }

    /// Counter key, namespaced by policy so two policies never share a bucket.
    pub fn key_for(&self, req: &LimitRequest<'_>) -> String {
        let key = match self.key_strategy {
            KeyStrategy::ClientIp => key::client_key(req.client_ip),
            KeyStrategy::ClientIpAndEmail => key::composite_key(req.client_ip, req.body_str("email")),
        };
        format!("rl:{}:{}", self.name, key)
    }
}
