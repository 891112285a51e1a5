/// Line-oriented operator commands, the console's replacement for the
/// launch/terminate dialogs of the old web UI. Parsing is pure so the
/// grammar is testable without a terminal.

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    Launch(LaunchRequest),
    AddWorkers { cluster_id: String, count: u32 },
    TerminateWorker { instance_id: String },
    TerminateCluster { cluster_id: String },
    ChangeImage { cluster_id: String, tag: String },
    Refresh,
    Help,
    Quit,
}

/// Unset fields are filled from reference data and preferences by the
/// controller: owner from history, tag from the newest build, instance
/// types from the first spec, bid from the worker type's hourly price.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaunchRequest {
    pub owner: Option<String>,
    pub tag: Option<String>,
    pub num_workers: Option<u32>,
    pub master_instance_type: Option<String>,
    pub worker_instance_type: Option<String>,
    pub lifetime_hours: Option<u32>,
    pub idle_timeout_minutes: Option<u32>,
    pub spot: bool,
    pub bid_price: Option<f64>,
    pub subnet_id: Option<String>,
    pub placement_group: Option<String>,
}

pub const USAGE: &str = "\
commands:
  launch [owner=NAME] [tag=TAG] [workers=N] [master=TYPE] [worker=TYPE]
         [lifetime=HOURS] [idle=MINUTES] [subnet=ID] [group=NAME]
         [spot] [bid=PRICE]
  add-workers <clusterId> <count>
  terminate-worker <instanceId>
  terminate-cluster <clusterId>
  change-image <clusterId> <tag>
  refresh
  help
  quit";

pub fn parse(line: &str) -> Result<OperatorCommand, String> {
    let mut tokens = line.split_whitespace();
    let Some(keyword) = tokens.next() else {
        return Err(USAGE.to_string());
    };
    match keyword {
        "launch" => parse_launch(tokens),
        "add-workers" => {
            let cluster_id = required(tokens.next(), "add-workers needs a cluster id")?;
            let count = required(tokens.next(), "add-workers needs a count")?
                .parse()
                .map_err(|_| "add-workers count must be a number".to_string())?;
            Ok(OperatorCommand::AddWorkers { cluster_id, count })
        }
        "terminate-worker" => {
            let instance_id = required(tokens.next(), "terminate-worker needs an instance id")?;
            Ok(OperatorCommand::TerminateWorker { instance_id })
        }
        "terminate-cluster" => {
            let cluster_id = required(tokens.next(), "terminate-cluster needs a cluster id")?;
            Ok(OperatorCommand::TerminateCluster { cluster_id })
        }
        "change-image" => {
            let cluster_id = required(tokens.next(), "change-image needs a cluster id")?;
            let tag = required(tokens.next(), "change-image needs a tag")?;
            Ok(OperatorCommand::ChangeImage { cluster_id, tag })
        }
        "refresh" => Ok(OperatorCommand::Refresh),
        "help" => Ok(OperatorCommand::Help),
        "quit" | "exit" => Ok(OperatorCommand::Quit),
        other => Err(format!("unknown command '{}'\n{}", other, USAGE)),
    }
}

fn required(token: Option<&str>, message: &str) -> Result<String, String> {
    token.map(str::to_string).ok_or_else(|| message.to_string())
}

fn parse_launch<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<OperatorCommand, String> {
    let mut request = LaunchRequest::default();
    for token in tokens {
        if token == "spot" {
            request.spot = true;
            continue;
        }
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{}'", token))?;
        match key {
            "owner" => request.owner = Some(value.to_string()),
            "tag" => request.tag = Some(value.to_string()),
            "workers" => {
                let count: u32 = value
                    .parse()
                    .map_err(|_| "workers must be a number".to_string())?;
                if count > 100 {
                    return Err("workers must be 100 or fewer".to_string());
                }
                request.num_workers = Some(count);
            }
            "master" => request.master_instance_type = Some(value.to_string()),
            "worker" => request.worker_instance_type = Some(value.to_string()),
            "lifetime" => {
                request.lifetime_hours =
                    Some(value.parse().map_err(|_| "lifetime must be hours".to_string())?)
            }
            "idle" => {
                request.idle_timeout_minutes =
                    Some(value.parse().map_err(|_| "idle must be minutes".to_string())?)
            }
            "bid" => {
                request.spot = true;
                request.bid_price =
                    Some(value.parse().map_err(|_| "bid must be a price".to_string())?)
            }
            "subnet" => request.subnet_id = Some(value.to_string()),
            "group" => request.placement_group = Some(value.to_string()),
            other => return Err(format!("unknown launch option '{}'", other)),
        }
    }
    Ok(OperatorCommand::Launch(request))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_parses_options() {
        let cmd = parse("launch owner=alice tag=build-42 workers=3 bid=0.42").unwrap();
        let OperatorCommand::Launch(request) = cmd else {
            panic!("expected a launch command");
        };
        assert_eq!(request.owner.as_deref(), Some("alice"));
        assert_eq!(request.tag.as_deref(), Some("build-42"));
        assert_eq!(request.num_workers, Some(3));
        assert!(request.spot);
        assert_eq!(request.bid_price, Some(0.42));
    }

    #[test]
    fn bare_spot_keyword_marks_spot_without_a_price() {
        let OperatorCommand::Launch(request) = parse("launch owner=alice spot").unwrap() else {
            panic!("expected a launch command");
        };
        assert!(request.spot);
        assert_eq!(request.bid_price, None);
    }

    #[test]
    fn worker_count_is_capped() {
        assert!(parse("launch workers=101").is_err());
    }

    #[test]
    fn terminate_worker_takes_an_instance_id() {
        assert_eq!(
            parse("terminate-worker i-abc").unwrap(),
            OperatorCommand::TerminateWorker {
                instance_id: "i-abc".to_string()
            }
        );
    }

    #[test]
    fn unknown_command_reports_usage() {
        let error = parse("destroy-everything").unwrap_err();
        assert!(error.contains("unknown command"));
    }
}
