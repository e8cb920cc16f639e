mod cli;
mod page_range;
mod search_cmd;
mod shared;
mod text_cmd;

use clap::Parser;
use cli::Cli;

fn main() {
    let cli = Cli::parse();
    shared::init_logging(cli.verbose);

    let result = match cli.command {
        cli::Commands::Text {
            ref file,
            ref pages,
            ref format,
            markup,
            ref interpreter,
        } => text_cmd::run(file, pages.as_deref(), format, interpreter.to_options(markup)),
        cli::Commands::Search {
            ref file,
            ref pattern,
            ref pages,
            case_insensitive,
            no_regex,
            ref format,
            ref interpreter,
        } => search_cmd::run(
            file,
            pattern,
            pages.as_deref(),
            case_insensitive,
            no_regex,
            format,
            interpreter.to_options(false),
        ),
    };

    if let Err(code) = result {
        std::process::exit(code);
    }
}
