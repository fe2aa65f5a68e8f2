use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use stardict_tools::app::{Viewer, ViewerEvent};
use stardict_tools::config::Config;
use stardict_tools::registry::Registry;
use stardict_tools::view::Viewport;

const USAGE: &str = "\
Usage: sdtui [-V|--version] [-h|--help] [--width N] [--height N] [dictionary.ifo...]

Without dictionary arguments the dictionaries of the configuration file are
loaded. Commands are read from standard input, one per line:
  text     search for text
  :j :k    scroll one line down / up
  :J :K    scroll one page down / up
  :n :p    select the next / previous line
  :d N     switch to dictionary N
  :] :[    next / previous dictionary
  :q       quit";

#[derive(Debug)]
struct Args {
    width: i32,
    height: i32,
    dictionaries: Vec<String>,
}

#[derive(Debug)]
enum Parsed {
    Run(Args),
    Exit,
}

fn parse_size(flag: &str, value: Option<String>) -> Result<i32, String> {
    let value = value.ok_or_else(|| format!("{} requires an argument", flag))?;
    match value.parse::<i32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("invalid value for {}: {}", flag, value)),
    }
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Parsed, String> {
    let mut parsed = Args {
        width: 80,
        height: 24,
        dictionaries: Vec::new(),
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-V" | "--version" => {
                println!("sdtui {}", env!("CARGO_PKG_VERSION"));
                return Ok(Parsed::Exit);
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(Parsed::Exit);
            }
            "--gui" => return Err("--gui: not supported".to_string()),
            "--width" => parsed.width = parse_size("--width", args.next())?,
            "--height" => parsed.height = parse_size("--height", args.next())?,
            s if s.starts_with('-') && s.len() > 1 => {
                return Err(format!("unknown option {}\n{}", s, USAGE))
            }
            _ => parsed.dictionaries.push(arg),
        }
    }
    Ok(Parsed::Run(parsed))
}

fn parse_command(line: &str) -> Result<ViewerEvent, String> {
    let Some(cmd) = line.strip_prefix(':') else {
        return Ok(ViewerEvent::SetInput(line.to_string()));
    };
    let event = match cmd.trim() {
        "j" => ViewerEvent::ScrollLines(1),
        "k" => ViewerEvent::ScrollLines(-1),
        "J" => ViewerEvent::ScrollPages(1),
        "K" => ViewerEvent::ScrollPages(-1),
        "n" => ViewerEvent::SelectNext,
        "p" => ViewerEvent::SelectPrev,
        "]" => ViewerEvent::NextDictionary,
        "[" => ViewerEvent::PrevDictionary,
        "q" => ViewerEvent::Quit,
        other => match other.strip_prefix('d').map(str::trim) {
            Some(n) => ViewerEvent::SelectDictionary(
                n.parse().map_err(|_| format!("bad dictionary number `{}'", n))?,
            ),
            None => return Err(format!("unknown command :{}", other)),
        },
    };
    Ok(event)
}

fn print_window(viewer: &Viewer, out: &mut impl Write) -> io::Result<()> {
    let view = viewer.view();
    writeln!(
        out,
        "-- {} [{}] {}",
        viewer.active_name(),
        viewer.registry().active_index(),
        view.input()
    )?;
    let selected = view.selection() as usize;
    for (i, row) in view.rows().iter().enumerate() {
        let mark = if i == selected { '>' } else { ' ' };
        writeln!(out, "{}{} | {}", mark, row.word().unwrap_or(""), row.text())?;
    }
    out.flush()
}

fn run(args: Args) -> Result<(), String> {
    let config = Config::discover().map_err(|e| e.to_string())?;
    let registry = if args.dictionaries.is_empty() {
        config.registry()
    } else {
        let mut registry = Registry::new(config.open_options());
        for path in &args.dictionaries {
            registry.add("", path);
        }
        registry
    };
    if registry.is_empty() {
        return Err("no dictionaries given or configured".to_string());
    }

    let mut registry = registry;
    registry
        .load_all(config.settings.load_threads)
        .map_err(|e| e.to_string())?;
    let viewport = Viewport::new(args.width, args.height);
    let mut viewer = Viewer::new(registry, viewport, config.settings.center_search)
        .map_err(|e| e.to_string())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    print_window(&viewer, &mut out).map_err(|e| e.to_string())?;

    for line in io::stdin().lock().lines() {
        let line = line.map_err(|e| e.to_string())?;
        let event = match parse_command(&line) {
            Ok(event) => event,
            Err(e) => {
                eprintln!("sdtui: {}", e);
                continue;
            }
        };
        match viewer.handle(event) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                eprintln!("sdtui: {}", e);
                continue;
            }
        }
        print_window(&viewer, &mut out).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn main() {
    let args = match parse_args(env::args().skip(1)) {
        Ok(Parsed::Run(args)) => args,
        Ok(Parsed::Exit) => return,
        Err(e) => {
            eprintln!("sdtui: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = run(args) {
        eprintln!("sdtui: {}", e);
        process::exit(1);
    }
}
