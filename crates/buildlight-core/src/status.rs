use buildlight_api::PipelinesPage;
use tracing::{debug, warn};

/// Build status of one repository, or of all of them combined
///
/// `NotSet` is only ever the driver's starting point. The classifier never
/// produces it, and fetch failures are errors rather than a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    NotSet,
    Success,
    InProgress,
    Fail,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::NotSet => "not set",
            Status::Success => "success",
            Status::InProgress => "in progress",
            Status::Fail => "fail",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Boil a page of pipelines (newest first) down to one status
///
/// The newest pipeline that is either running or finished decides. Pending
/// ones have no result yet and get skipped. Anything we can't make sense of
/// counts as a failure so the light goes red rather than quietly green.
pub fn classify(page: &PipelinesPage) -> Status {
    if page.values.is_empty() {
        debug!("no pipelines on page, treating as failure");
        return Status::Fail;
    }

    let state_name = page
        .values
        .iter()
        .find_map(|pipeline| {
            if pipeline.state.name == "IN_PROGRESS" {
                return Some(pipeline.state.name.as_str());
            }
            pipeline
                .state
                .result
                .as_ref()
                .map(|result| result.name.as_str())
                .filter(|name| !name.is_empty())
        })
        .unwrap_or_default();

    debug!("got state name {:?}", state_name);

    match state_name {
        "SUCCESSFUL" => Status::Success,
        "IN_PROGRESS" => Status::InProgress,
        "FAILED" => Status::Fail,
        other => {
            warn!("received unexpected state name from bitbucket: {:?}", other);
            Status::Fail
        }
    }
}
