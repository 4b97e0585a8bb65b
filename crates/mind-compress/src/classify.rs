use mind_core::ObservationType;

const PROBLEM_MARKERS: &[&str] = &["error", "failed", "exception"];
const SUCCESS_MARKERS: &[&str] = &["success", "passed", "completed"];
const WARNING_MARKERS: &[&str] = &["warning", "deprecated"];
const FIX_MARKERS: &[&str] = &["fix", "bug"];

/// Tools that only look at the workspace.
const DISCOVERY_TOOLS: &[&str] = &[
    "read",
    "glob",
    "grep",
    "ls",
    "list",
    "search",
    "webfetch",
    "websearch",
    "notebookread",
];
const EDIT_TOOLS: &[&str] = &["edit", "multiedit", "notebookedit"];
const WRITE_TOOLS: &[&str] = &["write"];

/// Map a tool invocation to an observation type.
///
/// Content markers are checked before the tool's default and in a fixed
/// order: problem, success, warning.
pub fn classify(tool_name: &str, output: &str) -> ObservationType {
    let lowered = output.to_lowercase();
    let mentions = |markers: &[&str]| markers.iter().any(|marker| lowered.contains(marker));

    if mentions(PROBLEM_MARKERS) {
        return ObservationType::Problem;
    }
    if mentions(SUCCESS_MARKERS) {
        return ObservationType::Success;
    }
    if mentions(WARNING_MARKERS) {
        return ObservationType::Warning;
    }

    let tool = tool_name.trim().to_ascii_lowercase();
    if DISCOVERY_TOOLS.contains(&tool.as_str()) {
        ObservationType::Discovery
    } else if EDIT_TOOLS.contains(&tool.as_str()) {
        if mentions(FIX_MARKERS) {
            ObservationType::Bugfix
        } else {
            ObservationType::Refactor
        }
    } else if WRITE_TOOLS.contains(&tool.as_str()) {
        ObservationType::Feature
    } else {
        ObservationType::Discovery
    }
}
