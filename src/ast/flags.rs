use bitflags::bitflags;

bitflags! {
    /// Capabilities of an AST node kind, used for cheap kind classification
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AstNodeFlags: u32 {
        /// Property or variable declaration
        const VARIABLE_FIELD = 1 << 0;
        /// Evaluates to a type and references other fields
        const EXPRESSION = 1 << 2;
        /// Type with no structure (`String`, `Number`, ...)
        const BASIC_TYPE = 1 << 3;
        /// Type which can be drilled into by key path (`Object`, `Array` of objects, ...)
        const DRILLDOWN_TYPE = 1 << 4;
        /// Type which can be enumerated (`Array`)
        const ENUMERATE_TYPE = 1 << 5;
        /// Union of other types
        const UNION_TYPE = 1 << 6;

        /// Any type
        const VARIABLE_TYPE = Self::BASIC_TYPE.bits()
            | Self::DRILLDOWN_TYPE.bits()
            | Self::ENUMERATE_TYPE.bits()
            | Self::UNION_TYPE.bits();
    }
}
