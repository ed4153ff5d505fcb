use ftests::{cli::Opts, errors::FtestError, executor::Registry};
use structopt::StructOpt;

fn main() {
    let opts = Opts::from_args();
    std::process::exit(match ftests::run(&opts, &Registry::new()) {
        Err(FtestError(msg)) => {
            println!("error: {}", msg);
            1
        }
        Ok(code) => code,
    })
}
