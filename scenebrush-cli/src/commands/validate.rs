//! The `validate-key` subcommand.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use clap::Args;

use scenebrush::gemini::ValidateKeyTask;
use scenebrush::runner::{ManualTickSource, TaskRunner};
use scenebrush::transport::HttpTransport;

use super::{resolve_api_key, run_to_idle};

#[derive(Args)]
pub struct ValidateArgs {
    /// API key; defaults to the GEMINI_API_KEY environment variable
    #[arg(long)]
    api_key: Option<String>,
}

pub fn run(mut args: ValidateArgs) -> i32 {
    let Some(api_key) = resolve_api_key(args.api_key.take()) else {
        eprintln!("error: no API key; pass --api-key or set GEMINI_API_KEY");
        return 2;
    };

    let transport = match HttpTransport::new() {
        Ok(transport) => Arc::new(transport),
        Err(message) => {
            eprintln!("error: {}", message);
            return 1;
        }
    };

    let ticks = Rc::new(ManualTickSource::new());
    let runner = TaskRunner::new(ticks.clone());

    let outcome: Rc<RefCell<Option<(bool, String)>>> = Rc::new(RefCell::new(None));
    let slot = outcome.clone();
    runner.start(
        ValidateKeyTask::new(api_key, transport, move |valid, message| {
            *slot.borrow_mut() = Some((valid, message))
        }),
        None,
    );

    run_to_idle(&ticks, &runner);

    let result = outcome.borrow_mut().take();
    match result {
        Some((true, message)) => {
            println!("{}", message);
            0
        }
        Some((false, message)) => {
            eprintln!("{}", message);
            1
        }
        None => {
            eprintln!("error: validation produced no result");
            1
        }
    }
}
