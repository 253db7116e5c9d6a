use crate::marketplace::Vendor;
use crate::models::Owner;

/// Product the user is in the middle of adding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingDraft {
    pub owner: Owner,
    pub vendor: Option<Vendor>,
    pub url: Option<String>,
}

impl TrackingDraft {
    pub fn new(owner: Owner) -> Self {
        Self {
            owner,
            vendor: None,
            url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingDelete {
    pub slug: Option<String>,
}

/// Per-conversation scratch data. The variant is chosen when a flow starts
/// and only that flow reads or writes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConversationContext {
    #[default]
    Empty,
    Tracking(TrackingDraft),
    Deleting(PendingDelete),
}

impl ConversationContext {
    pub fn is_tracking(&self) -> bool {
        matches!(self, ConversationContext::Tracking(_))
    }

    pub fn tracking(&self) -> Option<&TrackingDraft> {
        match self {
            ConversationContext::Tracking(draft) => Some(draft),
            _ => None,
        }
    }

    pub fn tracking_mut(&mut self) -> Option<&mut TrackingDraft> {
        match self {
            ConversationContext::Tracking(draft) => Some(draft),
            _ => None,
        }
    }

    pub fn pending_delete(&self) -> Option<&PendingDelete> {
        match self {
            ConversationContext::Deleting(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn pending_delete_mut(&mut self) -> Option<&mut PendingDelete> {
        match self {
            ConversationContext::Deleting(pending) => Some(pending),
            _ => None,
        }
    }
}
