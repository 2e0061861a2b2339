//! Local store keys

/// "true" once phone verification succeeded
pub const AUTHENTICATED: &str = "session.authenticated";
/// Phone number as entered during sign-in (with country code)
pub const PHONE: &str = "session.phone";
/// "true" once the phone was verified
pub const VERIFIED: &str = "session.verified";
pub const FIRST_NAME: &str = "profile.first_name";
/// Membership email used to unlock premium access
pub const EMAIL: &str = "membership.email";
pub const EMAIL_VERIFIED: &str = "membership.email_verified";
pub const IS_PREMIUM: &str = "membership.is_premium";
pub const MEMBERSHIP_TIER: &str = "membership.tier";

/// "true" once an analysis result was persisted
pub const ANALYSIS_COMPLETE: &str = "analysis.complete";
/// Backend analysis response, stored verbatim
pub const ANALYSIS_RESULT: &str = "analysis.result";

pub const CAPTURE_FACE_URI: &str = "capture.face_uri";
pub const CAPTURE_BODY_URI: &str = "capture.body_uri";
pub const CAPTURE_SKIN_URI: &str = "capture.skin_uri";

/// JSON map of preview identifier to base64 image
pub const GENERATED_PREVIEWS: &str = "previews.generated";

/// Keys removed on sign-out. Analysis data survives a sign-out.
pub const SESSION_KEYS: [&str; 8] = [
    AUTHENTICATED,
    PHONE,
    VERIFIED,
    IS_PREMIUM,
    EMAIL,
    EMAIL_VERIFIED,
    FIRST_NAME,
    MEMBERSHIP_TIER,
];

/// Keys removed by an analysis reset
pub const ANALYSIS_KEYS: [&str; 6] = [
    ANALYSIS_COMPLETE,
    ANALYSIS_RESULT,
    GENERATED_PREVIEWS,
    CAPTURE_FACE_URI,
    CAPTURE_BODY_URI,
    CAPTURE_SKIN_URI,
];
