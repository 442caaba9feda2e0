use bitflags::bitflags;

bitflags! {
    /// Flags for nodes in the TVFS path table.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct PathTableNodeFlags: u8 {
        const PATH_SEPARATOR_PRE = 0x01;
        const PATH_SEPARATOR_POST = 0x02;
        const IS_NODE_VALUE = 0x04;
    }
}
