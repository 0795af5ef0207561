//! Route paths.

pub const HEALTH: &str = "/api/health";

pub const AUTHORIZE: &str = "/oauth/authorize";
pub const LOGIN_FORM: &str = "/oauth/login";
pub const TOKEN: &str = "/oauth/token";
pub const REVOKE: &str = "/oauth/revoke";

pub const REGISTER: &str = "/api/register";
pub const LOGIN: &str = "/api/login";
pub const LOGOUT: &str = "/api/logout";

pub const USERINFO: &str = "/userinfo";
pub const PERMISSION_CHECK: &str = "/api/permissions/check";
pub const SUBJECT_PERMISSION_CHECK: &str = "/api/subjects/{id}/permissions/check";
