//! Device-lifecycle phases.

/// One step of the enumeration sequence, executed one per tick in the
/// order listed. At most one phase is pending at a time; [`Phase::CloseDevice`]
/// overrides any pending forward phase (detach always wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    OpenDevice,
    FetchDeviceInfo,
    FetchDeviceDescriptor,
    FetchConfigDescriptor,
    ClaimInterface,
    PrepareController,
    CloseDevice,
}

impl Phase {
    /// The phase armed after this one succeeds; `None` ends the sequence.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::OpenDevice => Some(Phase::FetchDeviceInfo),
            Phase::FetchDeviceInfo => Some(Phase::FetchDeviceDescriptor),
            Phase::FetchDeviceDescriptor => Some(Phase::FetchConfigDescriptor),
            Phase::FetchConfigDescriptor => Some(Phase::ClaimInterface),
            Phase::ClaimInterface => Some(Phase::PrepareController),
            Phase::PrepareController | Phase::CloseDevice => None,
        }
    }
}
