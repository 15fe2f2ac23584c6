//! Centralized constants for the default endpoint and app identity.

/// Bookmate API v5 base (resource paths are joined onto it).
pub(crate) const DEFAULT_BASE_API: &str = "https://api.bookmate.yandex.net/api/v5/";

/// App user-agents; one is picked at random per client.
pub(crate) const APP_USER_AGENTS: [&str; 10] = [
    "Samsung/Galaxy_A51 Android/12 Bookmate/3.7.3",
    "Huawei/P40_Lite Android/11 Bookmate/3.7.3",
    "OnePlus/Nord_N10 Android/10 Bookmate/3.7.3",
    "Google/Pixel_4a Android/9 Bookmate/3.7.3",
    "Oppo/Reno_4 Android/8 Bookmate/3.7.3",
    "Xiaomi/Redmi_Note_9 Android/10 Bookmate/3.7.3",
    "Motorola/Moto_G_Power Android/10 Bookmate/3.7.3",
    "Sony/Xperia_10 Android/10 Bookmate/3.7.3",
    "LG/Velvet Android/10 Bookmate/3.7.3",
    "Realme/6_Pro Android/10 Bookmate/3.7.3",
];

/// Header carrying the app user-agent.
pub(crate) const APP_USER_AGENT_HEADER: &str = "app-user-agent";

/// Header carrying the bearer token.
pub(crate) const AUTH_TOKEN_HEADER: &str = "auth-token";

/// Identity headers the app always sends, empty unless overridden.
pub(crate) const IDENTITY_HEADERS: [(&str, &str); 10] = [
    ("mcc", ""),
    ("mnc", ""),
    ("imei", ""),
    ("subscription-country", ""),
    ("app-locale", ""),
    ("bookmate-version", ""),
    ("bookmate-websocket-version", ""),
    ("device-idfa", ""),
    ("onyx-preinstall", "false"),
    ("accept-encoding", ""),
];

/// Number of body characters kept when reporting an error response.
pub(crate) const BODY_EXCERPT_CHARS: usize = 4000;
