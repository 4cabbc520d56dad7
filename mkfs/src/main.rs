//! The `mkfs` tool formats a device or regular file with a fresh yaf image.

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::exit;

use env_logger::fmt::Color;

/// Installs the diagnostic format required by §6.3: colorized
/// `LEVEL[mkfs(file:line)]: message` lines on stderr.
fn init_logger() {
	env_logger::Builder::from_default_env()
		.format(|buf, record| {
			let mut level_style = buf.style();
			let color = match record.level() {
				log::Level::Error => Color::Red,
				log::Level::Warn => Color::Yellow,
				log::Level::Info => Color::Green,
				log::Level::Debug | log::Level::Trace => Color::Cyan,
			};
			level_style.set_color(color).set_bold(true);
			writeln!(
				buf,
				"{}[mkfs({}:{})]: {}",
				level_style.value(record.level()),
				record.file().unwrap_or("?"),
				record.line().unwrap_or(0),
				record.args()
			)
		})
		.init();
}

fn usage(prog: &str) -> ! {
	eprintln!("usage: {prog} <device>");
	exit(libc::EINVAL);
}

fn main() {
	init_logger();

	let mut args = env::args();
	let prog = args.next().unwrap_or_else(|| "mkfs".to_owned());
	let device_path = match (args.next(), args.next()) {
		(Some(path), None) => PathBuf::from(path),
		_ => usage(&prog),
	};

	log::info!("formatting {}", device_path.display());
	if let Err(e) = yaf::mkfs::mkfs(&device_path) {
		log::error!("{e}");
		let code = match &e {
			yaf::Error::Io(io_err) => io_err.raw_os_error().unwrap_or(1),
			_ => 1,
		};
		exit(code);
	}
	log::info!("{} formatted successfully", device_path.display());
}
