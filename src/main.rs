use clap::Parser;
use folio::{CompositionRequest, FolioError};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "folio", about = "Compose a paginated PDF from a JSON request", version)]
struct Cli {
    /// Request JSON (contentHtml, headerHtml, footerHtml, margins, ...)
    request: PathBuf,

    /// Output PDF file
    #[arg(short, long)]
    output: PathBuf,

    /// Stylesheet appended to the request's css
    #[arg(long)]
    css: Option<PathBuf>,

    /// Extra font file; may be repeated
    #[arg(long = "font")]
    fonts: Vec<PathBuf>,
}

fn run(cli: &Cli) -> Result<(), FolioError> {
    let json = std::fs::read_to_string(&cli.request)?;
    let mut request = CompositionRequest::from_json(&json)?;
    if let Some(path) = &cli.css {
        request.css.push('\n');
        request.css.push_str(&std::fs::read_to_string(path)?);
    }
    for font in &cli.fonts {
        if !request.path_fonts.trim().is_empty() {
            request.path_fonts.push('|');
        }
        request.path_fonts.push_str(&font.to_string_lossy());
    }

    let Some(bytes) = request.compose()? else {
        log::warn!(
            "{}: contentHtml is empty; no PDF written",
            cli.request.display()
        );
        return Ok(());
    };
    std::fs::write(&cli.output, &bytes)?;
    log::info!("wrote {} ({} bytes)", cli.output.display(), bytes.len());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
