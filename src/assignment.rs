/// Row-index assignment state (spec.md §3). Transitions are monotone:
/// `Unassigned -> Binned` or `Unassigned -> Restricted`; no contig ever
/// re-enters `Unassigned` during core creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assignment {
    Unassigned,
    Binned(u64),
    Restricted,
}
