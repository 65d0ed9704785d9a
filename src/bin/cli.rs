//! Echoboot command line interface.

use std::cell::Cell;
use std::error::Error;
use std::process;
use std::rc::Rc;
use std::time::Duration;

use clap::{crate_authors, crate_description, crate_name, crate_version, value_t, App, AppSettings::*, Arg};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, trace, LevelFilter};
use simplelog::*;

use echoboot::{
    self as eb, DataBits, FlowControl, MarkerPolicy, Parity, SerialChannel, Settings, StopBits,
};

fn main() {
    println!("[EB] echoboot v{}", crate_version!());

    ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        process::exit(130);
    })
    .expect("Failed to install my Ctrl-C handler!");

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .author(crate_authors!())
        .about(crate_description!())
        .long_about(
            "\n\
            Echoboot pushes a program image to a board whose receiver loop \
            echoes back every byte it gets:\n\
               \t* sends the image size as 4 bytes, highest order first, and \
               checks the echo \n\
               \t* sends the image in chunks, checking the echo of each one \n\
               \t* waits for '#' \n\
               \t* sends 'D' \n\
            \n\
            Any echo mismatch aborts the transfer. Restart the board's \
            receiver loop and run echoboot again to retry.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .arg(
            Arg::with_name("PORT")
                .help("the serial port device to use")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("IMAGE")
                .help("path to the program image to be pushed")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::with_name("BAUD_RATE")
                .help("serial port baud rate")
                .short("-b")
                .long("--baud-rate")
                .takes_value(true)
                .default_value("115200")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("DATA_BITS")
                .help("number of bits per character")
                .short("-d")
                .long("--data-bits")
                .takes_value(true)
                .possible_values(&["5", "6", "7", "8"])
                .default_value("8")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("STOP_BITS")
                .help("number of stop bits per byte")
                .short("-s")
                .long("--stop-bits")
                .takes_value(true)
                .possible_values(&["1", "2"])
                .default_value("1")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("PARITY")
                .help("parity checking protocol")
                .short("-p")
                .long("--parity")
                .takes_value(true)
                .possible_values(&["none", "odd", "even"])
                .default_value("none")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("FLOW_CONTROL")
                .help("flow control mode")
                .short("-f")
                .long("--flow-control")
                .takes_value(true)
                .possible_values(&["none", "soft", "hard"])
                .default_value("none")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("TIMEOUT")
                .help("read timeout in seconds")
                .long_help(
                    "how long to wait, in seconds, for each echo from the \
                     board before giving up on the transfer",
                )
                .short("-t")
                .long("--timeout")
                .takes_value(true)
                .default_value("3")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("CHUNK_SIZE")
                .help("maximum number of bytes per write")
                .short("-c")
                .long("--chunk-size")
                .takes_value(true)
                .default_value("1000")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("LENIENT_MARKER")
                .help("acknowledge even if the board does not send '#'")
                .long("--lenient-marker"),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .get_matches();

    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'echoboot -v -v -v' or 'echoboot -vvv' vs 'echoboot -v'
    let log_level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if let Err(e) = TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("could not initialize logging: {}", e);
    }

    trace!("{:#?}", matches);

    // Arguments with default values ===========================================

    // It's safe to call unwrap on all command line arguments with default
    // values, because the value with either be what the user input at runtime
    // or the default value

    let baud_rate = numeric_arg::<u32>(&matches, "BAUD_RATE", "baud-rate");
    let timeout = numeric_arg::<u64>(&matches, "TIMEOUT", "timeout");
    let chunk_size = numeric_arg::<usize>(&matches, "CHUNK_SIZE", "chunk-size");
    if chunk_size == 0 {
        invalid_value("chunk-size", "0");
    }

    let data_bits = match matches.value_of("DATA_BITS").unwrap() {
        "5" => DataBits::Five,
        "6" => DataBits::Six,
        "7" => DataBits::Seven,
        "8" => DataBits::Eight,
        _ => unreachable!(),
    };

    let stop_bits = match matches.value_of("STOP_BITS").unwrap() {
        "1" => StopBits::One,
        "2" => StopBits::Two,
        _ => unreachable!(),
    };

    let parity = match matches.value_of("PARITY").unwrap() {
        "none" => Parity::None,
        "even" => Parity::Even,
        "odd" => Parity::Odd,
        _ => unreachable!(),
    };

    let flow_control = match matches.value_of("FLOW_CONTROL").unwrap() {
        "none" => FlowControl::None,
        "soft" => FlowControl::Software,
        "hard" => FlowControl::Hardware,
        _ => unreachable!(),
    };

    let marker_policy = if matches.is_present("LENIENT_MARKER") {
        MarkerPolicy::Lenient
    } else {
        MarkerPolicy::Strict
    };

    // END - Arguments with default values =====================================

    // Required arguments are guaranteed to be present by clap
    let settings = eb::SettingsBuilder::default()
        .path(matches.value_of("PORT").unwrap())
        .image(matches.value_of("IMAGE").unwrap())
        .baud_rate(baud_rate)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(parity)
        .flow_control(flow_control)
        .timeout(Duration::from_secs(timeout))
        .chunk_size(chunk_size)
        .marker_policy(marker_policy)
        .finalize();
    debug!("{:#?}", settings);

    // Run the transfer ========================================================

    let exit_code = match push(&settings) {
        Ok(transferred) => {
            println!(
                "[EB] ✅ total bytes transferred: {}",
                style(transferred).green()
            );
            0
        }
        Err(e) => {
            println!("{} {}", style("[EB] 💥 Transfer failed:").red(), e);
            1
        }
    };
    debug!("exit code: {}", exit_code);
    process::exit(exit_code);
}

/// Load the image, open the port and run one transfer session.
fn push(settings: &Settings) -> Result<usize, Box<dyn Error>> {
    // Both are set from required arguments.
    let image_path = settings.image.as_deref().unwrap_or_default();
    let payload = eb::load_image(image_path)?;
    let port = eb::open_and_setup_port(settings)?;

    let pb = ProgressBar::new(payload.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("[EB] ⏩ Pushing [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .progress_chars("=>-"));

    let last = Rc::new(Cell::new(0));
    let progress = {
        let pb = pb.clone();
        let last = Rc::clone(&last);
        move |done: usize, _total: usize| {
            last.set(done);
            pb.set_position(done as u64);
        }
    };

    let result = eb::factory(settings, Box::new(SerialChannel::new(port)), payload)
        .with_progress(progress)
        .run();
    match result {
        Ok(transferred) => {
            pb.finish_with_message("[EB] Image uploaded");
            Ok(transferred)
        }
        Err(e) => {
            pb.abandon();
            debug!("transfer aborted after {} verified bytes", last.get());
            Err(e.into())
        }
    }
}

fn numeric_arg<T: std::str::FromStr>(matches: &clap::ArgMatches, name: &str, long: &str) -> T {
    value_t!(matches.value_of(name), T)
        .unwrap_or_else(|_| invalid_value(long, matches.value_of(name).unwrap_or_default()))
}

fn invalid_value(long: &str, value: &str) -> ! {
    println!(
        "{}: `{}` needs to be a positive numeric value",
        style("error").red(),
        style(long).cyan()
    );
    println!(
        "   {} `{}` is not a valid value",
        style("-->").cyan(),
        style(value).on_red()
    );
    process::exit(-1);
}
