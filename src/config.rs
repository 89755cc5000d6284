//! Plugin configuration: explicit values passed into the engines instead of
//! ambient globals, with defined fallbacks.

/// Host-supplied settings for the auth and profile endpoints. The CRUD core
/// does not read this; only the thin auth/profile glue does.
#[derive(Clone, Debug)]
pub struct PluginConfig {
    /// Qualified name of the model backing authentication.
    pub user_model: String,
    pub username_field: String,
    pub password_field: String,
    pub email_field: String,
    /// Boolean field flipped by account activation.
    pub active_field: String,
    /// Fields returned by the user-info endpoint.
    pub profile_fields: Vec<String>,
    /// Fields the user may change through the profile endpoint.
    pub profile_editable_fields: Vec<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        PluginConfig {
            user_model: "auth.User".into(),
            username_field: "username".into(),
            password_field: "password".into(),
            email_field: "email".into(),
            active_field: "is_active".into(),
            profile_fields: vec!["username".into(), "email".into()],
            profile_editable_fields: vec!["email".into()],
        }
    }
}
