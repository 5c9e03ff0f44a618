//! Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser};
use hidd_daemon::Mode;
use hidd_protocol::{AdapterSelector, BdAddr};

#[derive(Debug, Parser)]
#[command(name = "hidd")]
#[command(about = "Bluetooth HID daemon", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Local adapter, as hciX or a device address
    #[arg(short = 'i', long = "device", value_name = "hciX|bdaddr")]
    pub device: Option<AdapterSelector>,

    /// Idle timeout in minutes before the driver drops a device
    #[arg(short = 't', long = "timeout", value_name = "minutes")]
    pub idle_timeout: Option<u32>,

    /// Configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Accepted for compatibility; hidd never detaches
    #[arg(short = 'n', long = "nodaemon", hide = true)]
    pub nodaemon: bool,

    #[command(flatten)]
    pub command: Command,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct Command {
    /// Accept incoming HID connections until stopped
    #[arg(long, visible_alias = "listen")]
    pub server: bool,

    /// Scan for HID devices and connect to each one found
    #[arg(long)]
    pub search: bool,

    /// Connect to one HID device
    #[arg(long, value_name = "bdaddr")]
    pub connect: Option<BdAddr>,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        match self.command.connect {
            Some(remote) => Mode::Connect(remote),
            None if self.command.search => Mode::Search,
            None => Mode::Server,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("hidd").chain(args.iter().copied()))
    }

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn modes() {
        assert_eq!(parse(&["--server"]).unwrap().mode(), Mode::Server);
        assert_eq!(parse(&["--listen"]).unwrap().mode(), Mode::Server);
        assert_eq!(parse(&["--search"]).unwrap().mode(), Mode::Search);

        let cli = parse(&["--connect", "00:11:22:33:44:55"]).unwrap();
        assert_eq!(
            cli.mode(),
            Mode::Connect("00:11:22:33:44:55".parse().unwrap())
        );
    }

    #[test]
    fn exactly_one_mode() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--server", "--search"]).is_err());
        assert!(parse(&["--search", "--connect", "00:11:22:33:44:55"]).is_err());
    }

    #[test]
    fn adapter_and_timeout() {
        let cli = parse(&["-i", "hci1", "-t", "5", "--server"]).unwrap();
        assert_eq!(cli.device, Some(AdapterSelector::Index(1)));
        assert_eq!(cli.idle_timeout, Some(5));

        let cli = parse(&["-i", "AA:BB:CC:DD:EE:FF", "--search"]).unwrap();
        assert!(matches!(cli.device, Some(AdapterSelector::Address(_))));
    }

    #[test]
    fn nodaemon_is_accepted_and_hidden() {
        let cli = parse(&["-n", "--server"]).unwrap();
        assert!(cli.nodaemon);
        assert_eq!(cli.mode(), Mode::Server);
        assert!(parse(&["--nodaemon", "--search"]).unwrap().nodaemon);
        assert!(!parse(&["--search"]).unwrap().nodaemon);

        let help = Cli::command().render_help().to_string();
        assert!(!help.contains("nodaemon"));
    }

    #[test]
    fn bad_address_is_rejected() {
        assert!(parse(&["--connect", "not-an-address"]).is_err());
        assert!(parse(&["-i", "hcix", "--server"]).is_err());
    }
}
