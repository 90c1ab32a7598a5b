use std::path::PathBuf;

use clap::{Parser, Subcommand};
use weft_core::JobId;

#[derive(Parser, Debug)]
#[command(about, long_about = None, version)]
pub(crate) struct Args {
    /// YAML queue config. Flags below override its values.
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,
    /// Job store file.
    #[arg(short, long, default_value = "weft-jobs.json")]
    pub(crate) store: PathBuf,
    /// Enables human-friendly logging.
    #[arg(short, long, default_value_t)]
    pub(crate) debug: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Push a job.
    Push {
        /// Job type (echo, sleep, fail).
        #[arg(short = 't', long = "type")]
        job_type: String,
        /// Job data as JSON.
        #[arg(long, default_value = "{}")]
        data: String,
        #[arg(long)]
        description: Option<String>,
        /// Lower runs first.
        #[arg(short, long)]
        priority: Option<i32>,
        /// Seconds before the job becomes eligible.
        #[arg(long, default_value_t = 0)]
        delay: u64,
        /// Lease length in seconds.
        #[arg(long)]
        ttr: Option<u32>,
    },
    /// Run every eligible job, then exit.
    Run,
    /// Run workers until ctrl-c.
    Work {
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// List jobs that are not done.
    Info {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show one job in full.
    Details { id: JobId },
    /// Requeue a failed job.
    Retry { id: JobId },
    /// Requeue every failed job.
    RetryAll,
    /// Remove a job.
    Release { id: JobId },
    /// Remove every job.
    ReleaseAll,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn push_parses_options() {
        let args = Args::try_parse_from([
            "weft", "--store", "/tmp/q.json", "push", "--type", "echo", "--data",
            r#"{"message":"hi"}"#, "--priority", "7", "--delay", "30",
        ])
        .unwrap();
        assert_eq!(args.store, PathBuf::from("/tmp/q.json"));
        match args.command {
            Command::Push {
                job_type,
                priority,
                delay,
                ttr,
                ..
            } => {
                assert_eq!(job_type, "echo");
                assert_eq!(priority, Some(7));
                assert_eq!(delay, 30);
                assert_eq!(ttr, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn ids_accept_prefixed_form() {
        let args = Args::try_parse_from([
            "weft",
            "retry",
            "job-01ARZ3NDEKTSV4RRFFQ69G5FAV",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Retry { .. }));
    }
}
