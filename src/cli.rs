// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, arg, value_parser};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print as JSON lines"),
    )
}

pub fn build_cli() -> Command {
    Command::new("finbot")
        .about("Stock transaction ledger with holdings and FIFO capital gains")
        .version(clap::crate_version!())
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .value_name("PATH")
                .help("SQLite database path or sqlite: URL (overrides FINBOT_DATABASE)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging"),
        )
        .subcommand(Command::new("init").about("Create or migrate the database"))
        .subcommand(
            Command::new("schema")
                .about("Schema ledger")
                .subcommand(json_flags(
                    Command::new("status").about("Applied and pending migrations"),
                )),
        )
        .subcommand(
            Command::new("user")
                .about("Manage users")
                .subcommand(
                    Command::new("add").arg(arg!(--name <NAME> "User name").required(true)),
                )
                .subcommand(json_flags(Command::new("list"))),
        )
        .subcommand(
            Command::new("stock")
                .about("Manage stocks")
                .subcommand(
                    Command::new("add")
                        .arg(arg!(--symbol <SYMBOL> "Ticker symbol").required(true))
                        .arg(arg!(--name <NAME> "Company name").required(false))
                        .arg(arg!(--market <MARKET> "Listing market, e.g. ASX").required(false)),
                )
                .subcommand(json_flags(
                    Command::new("list").arg(
                        Arg::new("all")
                            .long("all")
                            .action(ArgAction::SetTrue)
                            .help("Include archived stocks"),
                    ),
                ))
                .subcommand(
                    Command::new("archive")
                        .arg(arg!(--symbol <SYMBOL> "Ticker symbol").required(true)),
                )
                .subcommand(
                    Command::new("sync")
                        .about("Sync the stock list with a market's official listing")
                        .arg(arg!(--market <MARKET> "Market code").default_value("ASX")),
                ),
        )
        .subcommand(
            Command::new("tx")
                .about("Record and list buy/sell transactions")
                .subcommand(
                    Command::new("add")
                        .arg(arg!(--user <USER> "User id or name").required(true))
                        .arg(arg!(--stock <SYMBOL> "Stock symbol").required(true))
                        .arg(arg!(--date <DATE> "Trade date YYYY-MM-DD").required(true))
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .value_name("TYPE")
                                .required(true)
                                .help("buy or sell"),
                        )
                        .arg(arg!(--units <UNITS>).required(true).allow_hyphen_values(true))
                        .arg(arg!(--price <PRICE>).required(true))
                        .arg(arg!(--fee <FEE> "Brokerage").required(false))
                        .arg(arg!(--fy <FY> "Financial year label, defaults from date").required(false))
                        .arg(arg!(--notes <NOTES>).required(false)),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .arg(arg!(--user <USER>).required(false))
                        .arg(arg!(--stock <SYMBOL>).required(false))
                        .arg(arg!(--fy <FY>).required(false))
                        .arg(
                            arg!(--limit <N>)
                                .required(false)
                                .value_parser(value_parser!(usize)),
                        ),
                ))
                .subcommand(
                    Command::new("note")
                        .about("Replace the notes of a transaction")
                        .arg(
                            arg!(--id <ID>)
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(arg!(--text <TEXT>).required(true)),
                ),
        )
        .subcommand(json_flags(
            Command::new("holdings")
                .about("Units held per stock as of a date")
                .arg(arg!(--user <USER>).required(true))
                .arg(arg!(--date <DATE> "As-of date, defaults to today").required(false)),
        ))
        .subcommand(json_flags(
            Command::new("gains")
                .about("Realized capital gains for a financial year (FIFO)")
                .arg(arg!(--user <USER>).required(true))
                .arg(arg!(--fy <FY> "e.g. 2024-25").required(true)),
        ))
        .subcommand(
            Command::new("import").subcommand(
                Command::new("transactions")
                    .arg(arg!(--user <USER>).required(true))
                    .arg(arg!(--path <PATH> "CSV file").required(true)),
            ),
        )
        .subcommand(
            Command::new("export").subcommand(
                Command::new("transactions")
                    .arg(arg!(--user <USER>).required(false))
                    .arg(
                        arg!(--format <FORMAT>)
                            .required(false)
                            .default_value("csv")
                            .value_parser(["csv", "json"]),
                    )
                    .arg(arg!(--out <PATH>).required(true)),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }
}
