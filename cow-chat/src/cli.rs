use std::net::{IpAddr, SocketAddr};

use clap::Parser;

pub const DEFAULT_IP: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 1337;

/// Run the cow chat server.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// Server IP to bind to.
    #[arg(default_value = DEFAULT_IP)]
    pub ip: IpAddr,

    /// Server port. Use 0 for an ephemeral port.
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl ServerArgs {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Connect to a cow chat server and chat from the terminal.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ClientArgs {
    /// Server IP to connect to.
    #[arg(default_value = DEFAULT_IP)]
    pub ip_srv: IpAddr,

    /// Server port to connect to.
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port_srv: u16,
}

impl ClientArgs {
    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip_srv, self.port_srv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let args = ServerArgs::try_parse_from(["cow-server"]).expect("defaults parse");
        assert_eq!(args.listen_addr(), "0.0.0.0:1337".parse().expect("addr"));
    }

    #[test]
    fn server_positional_overrides() {
        let args =
            ServerArgs::try_parse_from(["cow-server", "127.0.0.1", "4000"]).expect("args parse");
        assert_eq!(args.listen_addr(), "127.0.0.1:4000".parse().expect("addr"));
    }

    #[test]
    fn client_ip_only_keeps_default_port() {
        let args = ClientArgs::try_parse_from(["cow-client", "10.0.0.7"]).expect("args parse");
        assert_eq!(args.server_addr(), "10.0.0.7:1337".parse().expect("addr"));
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(ClientArgs::try_parse_from(["cow-client", "127.0.0.1", "moo"]).is_err());
    }

    #[test]
    fn command_definitions_are_consistent() {
        use clap::CommandFactory;
        ServerArgs::command().debug_assert();
        ClientArgs::command().debug_assert();
    }
}
