use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Build the current file with Tundra and stream its output
#[derive(Parser, Debug)]
#[command(
    name = "tundra-bridge",
    about = "Build a single source file with the Tundra build tool",
    version,
    author,
    long_about = "tundra-bridge reads a project's configured Tundra build command line, \
                  runs the build tool for one source file, and streams the tool's output \
                  as it is produced. The tool's exit code becomes the exit code of \
                  tundra-bridge."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Build one file of a project",
        long_about = "Builds a single file using the project's Tundra build command line.\n\n\
                      The command line is taken from tundra-bridge.toml in the project \
                      directory unless --command-line is given.\n\n\
                      Examples:\n  \
                      tundra-bridge build --file src/main.cpp\n  \
                      tundra-bridge build /path/to/project --file src/main.cpp -c Release\n  \
                      tundra-bridge build --file a.c --command-line 'tundra2.exe -C t2 win64-msvc-debug-default'"
    )]
    Build(BuildArgs),

    #[command(
        about = "Show the launch parameters recognized in a build command line",
        long_about = "Parses a build command line and prints the tool path, build directory \
                      and configuration. Exits with code 3 when the command line is not \
                      recognized.\n\n\
                      Examples:\n  \
                      tundra-bridge extract '\"C:\\tools\\tundra2.exe\" -C \"C:\\proj\\t2\" win64-msvc-debug-default'\n  \
                      tundra-bridge extract --format json 'tundra2.exe -C t2 win64-msvc-debug-default'"
    )]
    Extract(ExtractArgs),

    #[command(about = "Show the effective configuration")]
    Config,
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[arg(
        value_name = "PROJECT_DIR",
        help = "Project directory (defaults to current directory)"
    )]
    pub project_dir: Option<PathBuf>,

    #[arg(short = 'f', long, value_name = "FILE", help = "Source file to build")]
    pub file: PathBuf,

    #[arg(
        long,
        value_name = "COMMAND_LINE",
        allow_hyphen_values = true,
        help = "Build command line to use instead of the project manifest"
    )]
    pub command_line: Option<String>,

    #[arg(
        short = 'c',
        long,
        value_name = "NAME",
        help = "Manifest configuration to use instead of the active one"
    )]
    pub configuration: Option<String>,

    #[arg(long, help = "Do not print the invocation before building")]
    pub no_echo: bool,

    #[arg(long, help = "Prefix lines read from the tool's stderr with [stderr]")]
    pub tag_streams: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(
        value_name = "COMMAND_LINE",
        allow_hyphen_values = true,
        help = "Build command line to parse"
    )]
    pub command_line: String,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_build_args() {
        let args = CliArgs::parse_from(["tundra-bridge", "build", "--file", "src/main.cpp"]);
        match args.command {
            Commands::Build(build_args) => {
                assert!(build_args.project_dir.is_none());
                assert_eq!(build_args.file, PathBuf::from("src/main.cpp"));
                assert!(build_args.command_line.is_none());
                assert!(build_args.configuration.is_none());
                assert!(!build_args.no_echo);
                assert!(!build_args.tag_streams);
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_build_with_options() {
        let args = CliArgs::parse_from([
            "tundra-bridge",
            "build",
            "/work/proj",
            "-f",
            "a.c",
            "--command-line",
            "tundra2.exe -C t2 win64-msvc-debug-default",
            "-c",
            "Release",
            "--no-echo",
            "--tag-streams",
        ]);
        match args.command {
            Commands::Build(build_args) => {
                assert_eq!(build_args.project_dir, Some(PathBuf::from("/work/proj")));
                assert_eq!(
                    build_args.command_line.as_deref(),
                    Some("tundra2.exe -C t2 win64-msvc-debug-default")
                );
                assert_eq!(build_args.configuration.as_deref(), Some("Release"));
                assert!(build_args.no_echo);
                assert!(build_args.tag_streams);
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_build_requires_file() {
        assert!(CliArgs::try_parse_from(["tundra-bridge", "build"]).is_err());
    }

    #[test]
    fn test_extract_command() {
        let args = CliArgs::parse_from([
            "tundra-bridge",
            "extract",
            "--format",
            "json",
            "tundra2.exe -C t2 win64-msvc-debug-default",
        ]);
        match args.command {
            Commands::Extract(extract_args) => {
                assert_eq!(extract_args.format, OutputFormatArg::Json);
                assert_eq!(
                    extract_args.command_line,
                    "tundra2.exe -C t2 win64-msvc-debug-default"
                );
            }
            _ => panic!("Expected Extract command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["tundra-bridge", "-v", "config"]);
        assert!(args.verbose);
        assert!(!args.quiet);

        let args = CliArgs::parse_from(["tundra-bridge", "--log-level", "trace", "config"]);
        assert_eq!(args.log_level.as_deref(), Some("trace"));

        assert!(CliArgs::try_parse_from(["tundra-bridge", "-v", "-q", "config"]).is_err());
    }
}
