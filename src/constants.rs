pub mod session_keys {

    pub const USER: &str = "user";

    pub const CSRF_TOKEN: &str = "csrf_token";

    /// Unix seconds of the last authenticated request; only set on
    /// browser-session logins.
    pub const LAST_SEEN: &str = "last_seen";
}

pub mod routes {

    pub const LOGIN: &str = "/login";

    pub const LOGOUT: &str = "/logout";

    /// Landing page after login and the fallback for insufficient roles.
    pub const DASHBOARD: &str = "/admin";
}

pub mod messages {

    pub const BAD_CREDENTIALS: &str = "Invalid username or password.";

    pub const ACCOUNT_DISABLED: &str = "This account is disabled. Contact an administrator.";

    pub const CSRF_INVALID: &str = "Security token invalid. Reload the page and try again.";

    pub const TRY_AGAIN_LATER: &str = "Something went wrong. Please try again later.";

    pub const LOGGED_OUT: &str = "You have been logged out.";
}

pub mod limits {

    pub const MAX_USERNAME_LEN: usize = 64;

    pub const MAX_PASSWORD_LEN: usize = 256;

    pub const MAX_TITLE_LEN: usize = 255;
}
