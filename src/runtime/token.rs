//! Poll token layout.
//!
//! Connection tokens are slab keys and grow from zero. The waker and the
//! two listeners take fixed tokens from the top of the range, where no slab
//! key will ever reach.

use super::PortRole;
use mio::Token;

/// Token of the shutdown waker.
pub const WAKER: Token = Token(usize::MAX);

const COMMAND_LISTENER: Token = Token(usize::MAX - 1);
const ECHO_LISTENER: Token = Token(usize::MAX - 2);

/// What a readiness event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Waker,
    Listener(PortRole),
    /// Connection identifier in the registry.
    Connection(usize),
}

/// Token a listener is registered under.
pub fn listener(role: PortRole) -> Token {
    match role {
        PortRole::Command => COMMAND_LISTENER,
        PortRole::Echo => ECHO_LISTENER,
    }
}

/// Token a connection is registered under.
pub fn connection(conn_id: usize) -> Token {
    Token(conn_id)
}

/// Decode an event token.
pub fn classify(token: Token) -> TokenKind {
    match token {
        WAKER => TokenKind::Waker,
        COMMAND_LISTENER => TokenKind::Listener(PortRole::Command),
        ECHO_LISTENER => TokenKind::Listener(PortRole::Echo),
        Token(conn_id) => TokenKind::Connection(conn_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_layout() {
        assert_eq!(classify(WAKER), TokenKind::Waker);
        for role in [PortRole::Command, PortRole::Echo] {
            assert_eq!(classify(listener(role)), TokenKind::Listener(role));
        }
        assert_eq!(classify(connection(0)), TokenKind::Connection(0));
        assert_eq!(classify(connection(42)), TokenKind::Connection(42));
        assert_ne!(listener(PortRole::Command), listener(PortRole::Echo));
    }
}
