/// Verified identity asserted by the external provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub subject: String,
    /// Lower-cased.
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}
