use std::path::PathBuf;

/// Exercise the Brotocol single-wire bus protocol.
///
/// Values are accepted in decimal or in hexadecimal with a "0x" prefix.
#[derive(clap::Parser)]
pub struct Options {
	/// Print more messages. Can be used multiple times.
	#[clap(long, short, global = true)]
	#[clap(action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[clap(subcommand)]
	pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
	/// Transmit one frame as the bus master.
	///
	/// The transmission runs over an in-process simulated line with a
	/// virtual clock. Attach a slave with --slave-address to have the frame
	/// acknowledged and delivered.
	Send {
		/// The address to deliver to.
		#[clap(long, short)]
		#[clap(value_name = "ADDRESS", value_parser = parse_value)]
		address: u8,

		/// The payload to deliver.
		#[clap(long, short)]
		#[clap(value_name = "DATA", value_parser = parse_value)]
		data: u8,

		/// Attach a slave answering to this address to the line.
		///
		/// Without a slave the transmission ends in an address nack.
		#[clap(long, short)]
		#[clap(value_name = "ADDRESS", value_parser = parse_value)]
		slave_address: Option<u8>,
	},

	/// Write shell completions to a file or to standard output.
	ShellCompletion {
		/// The shell for which to generate completions.
		#[clap(long)]
		shell: clap_complete::Shell,

		/// The file to write the generated completion file to.
		#[clap(long, short)]
		output: Option<PathBuf>,
	},
}

/// Parse a decimal or "0x"-prefixed hexadecimal value.
fn parse_value(data: &str) -> Result<u8, String> {
	let parsed = match data.strip_prefix("0x").or_else(|| data.strip_prefix("0X")) {
		Some(hex) => u8::from_str_radix(hex, 16),
		None => data.parse(),
	};
	parsed.map_err(|e| e.to_string())
}
