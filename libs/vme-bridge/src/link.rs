//! Link addressing: what identifies one physical bridge connection

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use vme_errors::{VmeError, VmeResult};
use vme_model::{BoardType, Controller, LinkArgKind, LinkKind};

/// Highest CONET node number in an optical daisy chain
pub const MAX_CONET_NODE: u16 = 7;

/// Board-dependent link argument given to `open`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkArg {
    /// USB device number or optical link number
    Index(u32),
    /// A4818 / USB V4718 product id
    Pid(u32),
    /// Hostname or IPv4 address of an Ethernet V4718
    Host(String),
}

impl LinkArg {
    pub fn kind(&self) -> LinkArgKind {
        match self {
            LinkArg::Index(_) => LinkArgKind::Index,
            LinkArg::Pid(_) => LinkArgKind::Pid,
            LinkArg::Host(_) => LinkArgKind::Host,
        }
    }
}

impl fmt::Display for LinkArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkArg::Index(n) => write!(f, "{}", n),
            LinkArg::Pid(pid) => write!(f, "pid{}", pid),
            LinkArg::Host(host) => f.write_str(host),
        }
    }
}

fn hostname_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::disallowed_methods)] // Literal pattern, always compiles
        Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
            .unwrap()
    })
}

fn validate_host(host: &str) -> VmeResult<()> {
    if host.parse::<Ipv4Addr>().is_ok() {
        return Ok(());
    }
    // Dotted-numeric strings that failed to parse are malformed addresses
    let all_numeric = host.split('.').all(|label| label.chars().all(|c| c.is_ascii_digit()));
    if host.is_empty() || host.len() > 253 || all_numeric || !hostname_pattern().is_match(host) {
        return Err(VmeError::invalid_param(
            "host",
            format!("'{}' is neither an IPv4 address nor a hostname", host),
        ));
    }
    Ok(())
}

/// Everything `open` needs to reach one bridge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkTarget {
    pub board: BoardType,
    pub arg: LinkArg,
    pub conet_node: u16,
}

impl LinkTarget {
    /// Validate the argument kind and node against the board type.
    /// The node is normalised to 0 on links without a daisy chain.
    pub fn new(board: BoardType, arg: LinkArg, conet_node: u16) -> VmeResult<Self> {
        let expected = board.link_arg_kind();
        if arg.kind() != expected {
            return Err(VmeError::invalid_param(
                "link_arg",
                format!("{} expects {:?}, got {:?}", board, expected, arg.kind()),
            ));
        }
        if let LinkArg::Host(host) = &arg {
            validate_host(host)?;
        }

        let link = board.link_kind();
        let conet_node = if link.is_conet() {
            if conet_node > MAX_CONET_NODE {
                return Err(VmeError::invalid_param(
                    "conet_node",
                    format!("{} exceeds {}", conet_node, MAX_CONET_NODE),
                ));
            }
            conet_node
        } else {
            0
        };

        Ok(Self {
            board,
            arg,
            conet_node,
        })
    }

    pub fn link_kind(&self) -> LinkKind {
        self.board.link_kind()
    }

    /// Identity of the physical link; two open sessions never share one
    pub fn key(&self) -> LinkKey {
        LinkKey {
            kind: self.link_kind(),
            controller: self.board.controller(),
            arg: self.arg.clone(),
            conet_node: self.conet_node,
            local: self.board.is_local(),
        }
    }
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} over {}:{}", self.board, self.link_kind(), self.arg)?;
        if self.link_kind().is_conet() {
            write!(f, "/node{}", self.conet_node)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkKey {
    pub kind: LinkKind,
    /// Optical link numbers are per controller family
    pub controller: Option<Controller>,
    pub arg: LinkArg,
    pub conet_node: u16,
    pub local: bool,
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.kind)?;
        if let Some(controller) = self.controller {
            write!(f, "{:?}:", controller)?;
        }
        write!(f, "{}/node{}", self.arg, self.conet_node)?;
        if self.local {
            f.write_str(" (local)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use vme_errors::ErrorCode;

    #[test]
    fn test_arg_kind_must_match_board() {
        let err = LinkTarget::new(BoardType::V1718, LinkArg::Pid(1234), 0).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParam);
        LinkTarget::new(BoardType::UsbA4818V2718, LinkArg::Pid(21000), 0).unwrap();
        LinkTarget::new(BoardType::EthV4718, LinkArg::Host("10.0.0.5".into()), 0).unwrap();
    }

    #[test]
    fn test_hosts() {
        assert!(validate_host("vme-crate-1.lab.local").is_ok());
        assert!(validate_host("192.168.1.20").is_ok());
        assert!(validate_host("").is_err());
        assert!(validate_host("bad host").is_err());
        assert!(validate_host("-leading").is_err());
        assert!(validate_host("300.1.1.1").is_err());
        assert!(validate_host("with\0nul").is_err());
    }

    #[test]
    fn test_conet_node_range() {
        let err = LinkTarget::new(BoardType::PcieA3818V3718, LinkArg::Index(0), 8).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParam);
        let target = LinkTarget::new(BoardType::PcieA3818V3718, LinkArg::Index(0), 7).unwrap();
        assert_eq!(target.conet_node, 7);
    }

    #[test]
    fn test_node_ignored_on_direct_links() {
        let target = LinkTarget::new(BoardType::V1718, LinkArg::Index(0), 42).unwrap();
        assert_eq!(target.conet_node, 0);
    }

    #[test]
    fn test_local_and_remote_keys_differ() {
        let local = LinkTarget::new(BoardType::UsbV3718Local, LinkArg::Index(0), 0).unwrap();
        let remote = LinkTarget::new(BoardType::UsbV3718, LinkArg::Index(0), 0).unwrap();
        assert_ne!(local.key(), remote.key());
        let again = LinkTarget::new(BoardType::UsbV3718, LinkArg::Index(0), 0).unwrap();
        assert_eq!(remote.key(), again.key());
    }

    #[test]
    fn test_controllers_have_separate_link_numbers() {
        let a2818 = LinkTarget::new(BoardType::V2718, LinkArg::Index(0), 0).unwrap();
        let a3818 = LinkTarget::new(BoardType::PcieA3818V3718, LinkArg::Index(0), 0).unwrap();
        assert_ne!(a2818.key(), a3818.key());

        // Same controller family, different bridge behind it
        let a2818_v3718 = LinkTarget::new(BoardType::PciA2818V3718, LinkArg::Index(0), 0).unwrap();
        assert_eq!(a2818.key(), a2818_v3718.key());
        assert_eq!(a3818.key().to_string(), "pci_conet:A3818:0/node0");
    }
}
