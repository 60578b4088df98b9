use clap::Parser;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

mod logging;
mod options;

use brotocol::sim::Line;
use brotocol::{Field, Master, Slave, TransmitError};
use options::{Command, Options};

const EXIT_OK: i32 = 0;
const EXIT_ADDRESS_NACK: i32 = 1;
const EXIT_DATA_NACK: i32 = 2;
const EXIT_DRIVER: i32 = 4;
const EXIT_USAGE: i32 = 8;

fn main() {
	let options = match Options::try_parse() {
		Ok(options) => options,
		Err(e) => {
			use clap::error::ErrorKind;
			let code = match e.kind() {
				ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_OK,
				_ => EXIT_USAGE,
			};
			let _ = e.print();
			std::process::exit(code);
		},
	};
	std::process::exit(do_main(options));
}

fn do_main(options: Options) -> i32 {
	logging::init(module_path!(), options.verbose as i8);
	match &options.command {
		Command::Send {
			address,
			data,
			slave_address,
		} => send(*address, *data, *slave_address),
		Command::ShellCompletion { shell, output } => {
			match write_shell_completion(*shell, output.as_deref()) {
				Ok(()) => EXIT_OK,
				Err(()) => EXIT_USAGE,
			}
		},
	}
}

fn send(address: u8, data: u8, slave_address: Option<u8>) -> i32 {
	let line = Line::new();
	let received = Rc::new(RefCell::new(Vec::new()));

	if let Some(slave_address) = slave_address {
		let sink = received.clone();
		let on_frame = Box::new(move |data| sink.borrow_mut().push(data)) as Box<dyn FnMut(u8)>;
		let slave = match Slave::new(line.slave_port(), line.slave_timer(), slave_address, on_frame) {
			Ok(slave) => slave,
			Err(e) => {
				log::error!("Failed to set up the slave: {}", e);
				return EXIT_USAGE;
			},
		};
		line.attach_slave(Rc::new(RefCell::new(slave)));
		log::debug!("Attached slave answering to address {:#04x}", slave_address);
	}

	let mut master = Master::new(line.master_port());
	match master.transmit(address, data) {
		Ok(()) => {
			log::info!("Frame acknowledged after {:?} of bus time", line.elapsed());
			for payload in received.borrow().iter() {
				log::info!("Slave received data {:#04x}", payload);
			}
			EXIT_OK
		},
		Err(e) => {
			log::error!("Transmission failed: {}", e);
			match e {
				TransmitError::InvalidValue(_) => EXIT_USAGE,
				TransmitError::Nack(nack) => match nack.field {
					Field::Address => EXIT_ADDRESS_NACK,
					Field::Data => EXIT_DATA_NACK,
				},
				TransmitError::Driver(_) => EXIT_DRIVER,
			}
		},
	}
}

fn write_shell_completion(shell: clap_complete::Shell, path: Option<&Path>) -> Result<(), ()> {
	use clap::CommandFactory;
	use std::io::Write;

	let mut buffer = Vec::with_capacity(4 * 1024);

	let mut command = Options::command();
	clap_complete::generate(shell, &mut command, env!("CARGO_BIN_NAME"), &mut buffer);
	if !buffer.ends_with(b"\n") {
		buffer.push(b'\n');
	}

	let path = path.unwrap_or_else(|| Path::new("-"));
	if path == Path::new("-") {
		log::debug!("Writing shell completion for {} to stdout", shell);
		std::io::stdout()
			.lock()
			.write_all(&buffer)
			.map_err(|e| log::error!("Failed to write to stdout: {}", e))?;
	} else {
		log::debug!("Writing shell completion for {} to {}", shell, path.display());
		let mut output =
			std::fs::File::create(path).map_err(|e| log::error!("Failed to create {}: {}", path.display(), e))?;
		output
			.write_all(&buffer)
			.map_err(|e| log::error!("Failed to write to {}: {}", path.display(), e))?;
	}

	Ok(())
}
