use smol_str::SmolStr;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableEngineConfig {
    /// Key [VariableEngine::set_var](crate::VariableEngine::set_var) stores a declaration under
    /// when none is given
    pub default_var_key: SmolStr,
    /// Prefix of the keys generated for nodes whose JSON has no `key`
    pub generated_key_prefix: SmolStr,
}

impl Default for VariableEngineConfig {
    fn default() -> Self {
        VariableEngineConfig {
            default_var_key: SmolStr::new_inline("outputs"),
            generated_key_prefix: SmolStr::new_inline("__node_"),
        }
    }
}

impl VariableEngineConfig {
    pub fn with_default_var_key(mut self, key: impl Into<SmolStr>) -> Self {
        self.default_var_key = key.into();
        self
    }

    pub fn with_generated_key_prefix(mut self, prefix: impl Into<SmolStr>) -> Self {
        self.generated_key_prefix = prefix.into();
        self
    }
}
