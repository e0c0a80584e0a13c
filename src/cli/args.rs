//! Command-line arguments

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Browser web API client for a photo-sharing platform
#[derive(Debug, Parser)]
#[command(name = "gramweb", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session
    Login {
        /// Account name; falls back to IG_USERNAME
        #[arg(short, long)]
        username: Option<String>,
    },

    /// End the stored session
    Logout,

    /// Show a profile
    Profile { username: String },

    /// Show the logged-in account's profile
    Account,

    /// List an account's active stories
    Stories {
        username: String,

        /// Also report the listed stories as viewed
        #[arg(long)]
        mark_seen: bool,
    },

    /// List followers of an account
    Followers(ListArgs),

    /// List accounts an account follows
    Following(ListArgs),

    /// List recent posts of an account
    Media(ListArgs),

    /// List accounts that liked a post
    Likers {
        /// Post URL or shortcode
        post: String,
        #[arg(short, long, default_value_t = 50)]
        amount: usize,
    },

    /// List top and recent posts for a hashtag
    Hashtag {
        tag: String,
        #[arg(short, long, default_value_t = 50)]
        amount: usize,
    },

    /// Search accounts
    Search {
        query: String,
        #[arg(short, long, default_value_t = 10)]
        amount: usize,
    },

    /// Follow an account (username or numeric id)
    Follow { user: String },

    /// Unfollow an account (username or numeric id)
    Unfollow { user: String },

    /// Like a post (URL, shortcode or media id)
    Like { post: String },

    /// Remove a like
    Unlike { post: String },

    /// Comment on a post
    Comment { post: String, text: String },

    /// Publish a photo or video
    Upload(UploadArgs),

    /// Show the configured action ceilings and this process's counters
    ///
    /// Counters live in memory only. Every invocation starts a fresh hourly
    /// window, so counts are always zero here; they are meaningful only to a
    /// program that keeps one client alive across actions.
    Stats,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    pub username: String,

    /// How many entries to fetch
    #[arg(short, long, default_value_t = 50)]
    pub amount: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UploadTarget {
    /// Photo post in the feed
    Photo,
    /// Video post in the feed
    Video,
    /// Photo story
    StoryPhoto,
    /// Video story
    StoryVideo,
    /// Short-form clip
    Clip,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    #[arg(value_enum)]
    pub target: UploadTarget,

    pub path: PathBuf,

    #[arg(short, long, default_value = "")]
    pub caption: String,

    /// Cover frame for videos; extracted with ffmpeg when omitted
    #[arg(short, long, value_name = "FILE")]
    pub thumbnail: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upload() {
        let cli = Cli::parse_from([
            "gramweb",
            "upload",
            "story-video",
            "clip.mp4",
            "--thumbnail",
            "cover.jpg",
            "-v",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Command::Upload(args) => {
                assert_eq!(args.target, UploadTarget::StoryVideo);
                assert_eq!(args.path, PathBuf::from("clip.mp4"));
                assert_eq!(args.thumbnail, Some(PathBuf::from("cover.jpg")));
                assert!(args.caption.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_stories_mark_seen() {
        let cli = Cli::parse_from(["gramweb", "stories", "alice", "--mark-seen"]);
        match cli.command {
            Command::Stories {
                username,
                mark_seen,
            } => {
                assert_eq!(username, "alice");
                assert!(mark_seen);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_list_default_amount() {
        let cli = Cli::parse_from(["gramweb", "followers", "someone"]);
        match cli.command {
            Command::Followers(args) => {
                assert_eq!(args.username, "someone");
                assert_eq!(args.amount, 50);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
