//! Line-oriented command loop

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::info;

use crate::commands::CommandDispatcher;
use crate::error::Result;

/// Read commands until end of input, then shut the session down
///
/// Each command runs to completion before the next line is read, so
/// `logout` holds the loop until the session is closed.
pub async fn run<R>(dispatcher: &mut CommandDispatcher, input: R, prompt: &str) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        if !prompt.is_empty() {
            dispatcher.console().print_prompt(prompt);
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        dispatcher.execute_line(&line).await;
    }

    info!("End of input, shutting down");
    dispatcher.shutdown().await;
    Ok(())
}
