//! CLI module - Command-line interface for bingebeacon
//!
//! This module provides a structured CLI using clap for argument parsing.

use crate::domain::{TitleId, UserId};
use clap::{Parser, Subcommand};

/// bingebeacon - TV and movie metadata tracker
/// Keeps followed titles in sync and notifies users about new episodes
#[derive(Parser)]
#[command(name = "bingebeacon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as background daemon with scheduler
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Reconcile a single title now
    Sync {
        /// Local title id
        title_id: TitleId,
    },

    /// Follow a title for a user and queue its first sync
    #[command(alias = "t")]
    Track {
        /// User id
        user_id: UserId,
        /// TMDB id of the title
        tmdb_id: i32,
        /// The title is a movie rather than a series
        #[arg(long)]
        movie: bool,
    },

    /// Stop following a title for a user
    Untrack {
        /// User id
        user_id: UserId,
        /// Local title id
        title_id: TitleId,
    },

    /// List the stored episodes of a title
    #[command(alias = "e")]
    Episodes {
        /// Local title id
        title_id: TitleId,
    },

    /// Run a scheduled job once (episode_sync, notification_dispatch, stale_cleanup)
    RunJob {
        name: String,
    },

    /// Write a default config.toml if none exists
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_track_with_movie_flag() {
        let user = uuid::Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "bingebeacon",
            "track",
            &user.to_string(),
            "603",
            "--movie",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Track {
                user_id,
                tmdb_id,
                movie,
            }) => {
                assert_eq!(user_id.value(), user);
                assert_eq!(tmdb_id, 603);
                assert!(movie);
            }
            _ => panic!("expected track command"),
        }
    }

    #[test]
    fn rejects_malformed_title_id() {
        assert!(Cli::try_parse_from(["bingebeacon", "sync", "not-a-uuid"]).is_err());
    }

    #[test]
    fn parses_untrack_and_episodes() {
        let user = uuid::Uuid::new_v4();
        let title = TitleId::new();

        let cli = Cli::try_parse_from([
            "bingebeacon",
            "untrack",
            &user.to_string(),
            &title.to_string(),
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Untrack { title_id, .. }) if title_id == title
        ));

        let cli = Cli::try_parse_from(["bingebeacon", "e", &title.to_string()]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Episodes { title_id }) if title_id == title));
    }

    #[test]
    fn run_job_takes_a_name() {
        let cli = Cli::try_parse_from(["bingebeacon", "run-job", "stale_cleanup"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::RunJob { name }) if name == "stale_cleanup"));
    }
}
