use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StageAction {
    Start,
    Stop,
    Restart,
    Delete,
    Other(String),
}

impl StageAction {
    pub fn as_str(&self) -> &str {
        match self {
            StageAction::Start => "start",
            StageAction::Stop => "stop",
            StageAction::Restart => "restart",
            StageAction::Delete => "delete",
            StageAction::Other(verb) => verb,
        }
    }

    /// Server-side commands this action is made of, in order.
    pub fn steps(&self) -> Vec<StageAction> {
        match self {
            StageAction::Restart => vec![StageAction::Stop, StageAction::Start],
            other => vec![other.clone()],
        }
    }

    pub fn is_compound(&self) -> bool {
        self.steps().len() > 1
    }
}

impl fmt::Display for StageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageAction {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "" => Err("empty action".to_string()),
            "start" => Ok(StageAction::Start),
            "stop" => Ok(StageAction::Stop),
            "restart" => Ok(StageAction::Restart),
            "delete" => Ok(StageAction::Delete),
            other if other.contains('/') || other.contains('?') => {
                Err(format!("invalid action: {other}"))
            }
            other => Ok(StageAction::Other(other.to_string())),
        }
    }
}

/// Where action arguments go on the command request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgumentStyle {
    /// `/stages/{name}/{action}/{arguments}`
    #[default]
    Path,
    /// `/stages/{name}/{action}?{arguments}`
    Query,
}

impl FromStr for ArgumentStyle {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "path" => Ok(ArgumentStyle::Path),
            "query" => Ok(ArgumentStyle::Query),
            other => Err(format!("Unknown argument style: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub stage: String,
    pub action: StageAction,
    pub arguments: Option<String>,
}

impl ActionRequest {
    pub fn new(stage: impl Into<String>, action: StageAction) -> Self {
        Self {
            stage: stage.into(),
            action,
            arguments: None,
        }
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        let arguments = arguments.into();
        self.arguments = if arguments.trim().is_empty() {
            None
        } else {
            Some(arguments)
        };
        self
    }

    pub fn path_segments(&self, style: ArgumentStyle) -> Vec<&str> {
        let mut segments = vec!["stages", self.stage.as_str(), self.action.as_str()];
        if let (ArgumentStyle::Path, Some(arguments)) = (style, self.arguments.as_deref()) {
            segments.push(arguments);
        }
        segments
    }

    pub fn query(&self, style: ArgumentStyle) -> Option<&str> {
        match style {
            ArgumentStyle::Query => self.arguments.as_deref(),
            ArgumentStyle::Path => None,
        }
    }
}

impl fmt::Display for ActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.stage)?;
        if let Some(arguments) = &self.arguments {
            write!(f, " ({arguments})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Idle,
    RunningFirst,
    RunningSecond,
    Done,
    Failed,
}

impl SequenceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SequenceState::Done | SequenceState::Failed)
    }
}

/// Drives an action through its command steps. A failed step ends the
/// sequence; later steps are never issued. Arguments travel with the last
/// step only.
#[derive(Debug, Clone)]
pub struct ActionSequence {
    request: ActionRequest,
    steps: Vec<StageAction>,
    state: SequenceState,
    process_ids: Vec<String>,
    failure: Option<String>,
}

impl ActionSequence {
    pub fn new(request: ActionRequest) -> Self {
        let steps = request.action.steps();
        Self {
            request,
            steps,
            state: SequenceState::Idle,
            process_ids: Vec::new(),
            failure: None,
        }
    }

    pub fn request(&self) -> &ActionRequest {
        &self.request
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn process_ids(&self) -> &[String] {
        &self.process_ids
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn start(&mut self) -> Option<ActionRequest> {
        if self.state != SequenceState::Idle {
            return None;
        }
        self.state = SequenceState::RunningFirst;
        self.current_step()
    }

    /// Records the step's process id and returns the next step, if any.
    pub fn step_succeeded(&mut self, process_id: impl Into<String>) -> Option<ActionRequest> {
        let next = match self.state {
            SequenceState::RunningFirst if self.steps.len() > 1 => SequenceState::RunningSecond,
            SequenceState::RunningFirst | SequenceState::RunningSecond => SequenceState::Done,
            _ => return None,
        };
        self.process_ids.push(process_id.into());
        self.state = next;
        self.current_step()
    }

    pub fn step_failed(&mut self, message: impl Into<String>) {
        if matches!(
            self.state,
            SequenceState::RunningFirst | SequenceState::RunningSecond
        ) {
            self.failure = Some(message.into());
            self.state = SequenceState::Failed;
        }
    }

    pub fn current_step(&self) -> Option<ActionRequest> {
        let index = match self.state {
            SequenceState::RunningFirst => 0,
            SequenceState::RunningSecond => 1,
            _ => return None,
        };
        let action = self.steps.get(index)?.clone();
        let mut step = ActionRequest::new(self.request.stage.clone(), action);
        if index + 1 == self.steps.len() {
            step.arguments = self.request.arguments.clone();
        }
        Some(step)
    }
}
