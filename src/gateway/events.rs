//! Inbound events delivered by the platform connection

use crate::types::{ChannelId, Member, MemberId};

/// Events the platform connection feeds into the service
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A new member joined the guild
    MemberJoined { member: Member },

    /// A member left the guild entirely
    MemberLeft { member_id: MemberId },

    /// A member entered a voice/stage channel
    ChannelEntered {
        member_id: MemberId,
        channel: ChannelId,
    },

    /// A member left a voice/stage channel
    ChannelLeft {
        member_id: MemberId,
        channel: ChannelId,
    },
}
