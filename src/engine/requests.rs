use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Independent stream of async requests. A newer request on a channel
/// supersedes every older one on the same channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestChannel {
    Chat,
    Departure,
    Arrival,
    Leg(usize),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestTicket {
    pub channel: RequestChannel,
    pub token: u64,
}

/// Issues tickets and tells whether a ticket is still the latest on its channel.
#[derive(Debug, Default)]
pub struct RequestGuard {
    next_token: u64,
    latest: HashMap<RequestChannel, u64>,
}

impl RequestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, channel: RequestChannel) -> RequestTicket {
        self.next_token += 1;
        self.latest.insert(channel, self.next_token);
        RequestTicket {
            channel,
            token: self.next_token,
        }
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.latest.get(&ticket.channel) == Some(&ticket.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_ticket_supersedes_older_on_same_channel() {
        let mut guard = RequestGuard::new();
        let first = guard.issue(RequestChannel::Arrival);
        let second = guard.issue(RequestChannel::Arrival);
        assert!(!guard.is_current(&first));
        assert!(guard.is_current(&second));
    }

    #[test]
    fn channels_are_independent() {
        let mut guard = RequestGuard::new();
        let arrival = guard.issue(RequestChannel::Arrival);
        guard.issue(RequestChannel::Departure);
        guard.issue(RequestChannel::Leg(0));
        assert!(guard.is_current(&arrival));
    }

    #[test]
    fn forged_ticket_is_not_current() {
        let guard = RequestGuard::new();
        let ticket = RequestTicket {
            channel: RequestChannel::Chat,
            token: 1,
        };
        assert!(!guard.is_current(&ticket));
    }
}
