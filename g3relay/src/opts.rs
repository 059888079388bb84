/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint, value_parser};

const ARGS_VERSION: &str = "version";
const ARGS_CONFIG_FILE: &str = "config-file";
const ARGS_VERBOSE: &str = "verbose";
const ARGS_TEST_CONFIG: &str = "test-config";

#[derive(Debug, Default)]
pub struct ProcArgs {
    pub config_file: PathBuf,
    pub verbose_level: u8,
    pub test_config: bool,
}

fn build_cli_args() -> Command {
    Command::new(crate::PKG_NAME)
        .disable_version_flag(true)
        .arg(
            Arg::new(ARGS_VERSION)
                .help("Show version")
                .action(ArgAction::SetTrue)
                .short('V')
                .long("version"),
        )
        .arg(
            Arg::new(ARGS_VERBOSE)
                .help("Show verbose output")
                .action(ArgAction::Count)
                .short('v')
                .long("verbose"),
        )
        .arg(
            Arg::new(ARGS_TEST_CONFIG)
                .help("Test the format of config file and exit")
                .action(ArgAction::SetTrue)
                .short('t')
                .long("test-config"),
        )
        .arg(
            Arg::new(ARGS_CONFIG_FILE)
                .help("Config file path")
                .num_args(1)
                .value_name("CONFIG FILE")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .required_unless_present(ARGS_VERSION)
                .short('c')
                .long("config-file"),
        )
}

fn parse_matches(args: &ArgMatches) -> anyhow::Result<Option<ProcArgs>> {
    if args.get_flag(ARGS_VERSION) {
        println!("{} {}", crate::PKG_NAME, crate::PKG_VERSION);
        return Ok(None);
    }

    let mut proc_args = ProcArgs {
        verbose_level: args.get_count(ARGS_VERBOSE),
        test_config: args.get_flag(ARGS_TEST_CONFIG),
        ..Default::default()
    };
    let config_file = args
        .get_one::<PathBuf>(ARGS_CONFIG_FILE)
        .ok_or_else(|| anyhow!("no config file given"))?;
    if !config_file.is_file() {
        return Err(anyhow!(
            "config file {} is not an existed file",
            config_file.display()
        ));
    }
    proc_args.config_file = config_file.clone();
    Ok(Some(proc_args))
}

pub fn parse_clap() -> anyhow::Result<Option<ProcArgs>> {
    let args = build_cli_args().get_matches();
    parse_matches(&args)
}
