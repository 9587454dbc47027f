// repair-pipeline-rs/src/prompts.rs
// Prompt text for each completion-backed stage.

use shared_types::ExecutionResult;

use crate::PipelineState;

fn fenced(code: &str) -> String {
    format!("```python\n{}\n```", code)
}

/// Diagnosis of a crash.
pub(crate) fn analyze_failure(state: &PipelineState) -> String {
    format!(
        "You are an expert Python debugger. Analyze this execution failure precisely.\n\n\
         CODE:\n{code}\n\n\
         Error type: {error_type}\n\
         Error message: {message}\n\n\
         Traceback:\n{traceback}\n\n\
         Classify the failure (syntax, name, type, index, value, recursion, runtime or logic), \
         then answer:\n\
         1. Category\n\
         2. Line that caused the error\n\
         3. Root cause\n\
         4. Minimal fix\n\n\
         Be specific and concise. Describe the actual error, not hypothetical ones.",
        code = fenced(&state.code),
        error_type = state.error_type,
        message = state.error_message,
        traceback = state.traceback,
    )
}

/// Review of code that ran without crashing.
pub(crate) fn analyze_success(state: &PipelineState) -> String {
    let (stdout, stderr, exit_code) = execution_fields(state.execution_result.as_ref());
    format!(
        "You are an expert Python code reviewer. This code executed successfully but may still \
         contain logical errors.\n\n\
         CODE:\n{code}\n\n\
         Stdout: {stdout}\n\
         Stderr: {stderr}\n\
         Exit code: {exit_code}\n\n\
         Look for algorithm mistakes (binary search bounds such as `low = mid` instead of \
         `low = mid + 1`, loop conditions using < where <= is needed), unhandled edge cases \
         (empty input, single element, zero or negative values, off-by-one boundaries), wrong \
         return values and functions that are defined but never called.\n\n\
         Answer:\n\
         1. Does the code have logical errors? [YES/NO]\n\
         2. If YES, what is wrong\n\
         3. The correct implementation, briefly\n\
         4. Severity [CRITICAL/MEDIUM/LOW/NONE]\n\n\
         If the code is logically correct and complete, respond with exactly \"NONE - Code is correct\".",
        code = fenced(&state.code),
    )
}

/// Full replacement text for failing code.
pub(crate) fn patch_failure(state: &PipelineState) -> String {
    format!(
        "You are a precise Python code fixer. Fix ONLY the reported error with the smallest \
         possible change.\n\n\
         ORIGINAL CODE:\n{code}\n\n\
         ERROR:\n{message}\n\n\
         TRACEBACK:\n{traceback}\n\n\
         ANALYSIS:\n{analysis}\n\n\
         Rules:\n\
         1. Change only the line(s) that caused the error\n\
         2. Add imports only for ImportError or ModuleNotFoundError\n\
         3. Do not add features or touch working code\n\
         4. Return ONLY valid Python code, without comments or explanations\n\n\
         FIXED CODE:",
        code = fenced(&state.code),
        message = state.error_message,
        traceback = state.traceback,
        analysis = state.reasoning,
    )
}

/// Full replacement text for code with a logical defect.
pub(crate) fn patch_logic(state: &PipelineState) -> String {
    let (stdout, _, _) = execution_fields(state.execution_result.as_ref());
    format!(
        "You are a precise Python code fixer. This code runs but produces wrong results.\n\n\
         ORIGINAL CODE:\n{code}\n\n\
         OUTPUT:\n{stdout}\n\n\
         ANALYSIS:\n{analysis}\n\n\
         Rules:\n\
         1. Fix the logical error identified in the analysis\n\
         2. Make minimal changes and keep all other code unchanged\n\
         3. If a function is only defined, add a call with sample data at the end\n\
         4. Return ONLY valid Python code, without comments or explanations\n\n\
         FIXED CODE:",
        code = fenced(&state.code),
        analysis = state.reasoning,
    )
}

pub(crate) fn refine(state: &PipelineState) -> String {
    format!(
        "You are an expert at refactoring. Improve this working code so it is more readable, \
         idiomatic and efficient without changing its behaviour.\n\n\
         {code}\n\n\
         Provide ONLY the refactored code, no explanations.",
        code = fenced(&state.code),
    )
}

pub(crate) fn generate_tests(state: &PipelineState) -> String {
    format!(
        "You are an expert at writing Python tests. Write 2-3 simple test cases that verify \
         this code works correctly.\n\n\
         {code}\n\n\
         Provide only the test code, no explanations.",
        code = fenced(&state.code),
    )
}

pub(crate) fn explain(state: &PipelineState) -> String {
    let original_error = if state.original_error_message().is_empty() {
        "none (logical review of code that ran successfully)"
    } else {
        state.original_error_message()
    };
    let latest_error = if state.error_message.is_empty() || state.error_message == state.original_error_message() {
        String::new()
    } else {
        format!("Error after the patch: {}\n", state.error_message)
    };
    format!(
        "You are an expert at explaining code changes. Summarize this repair.\n\n\
         Original error: {error}\n\
         {latest}\
         Patches produced: {patches}\n\
         Final status: {status}\n\n\
         Explain what was wrong, what was changed and why the change works. \
         Keep it under 100 words.",
        error = original_error,
        latest = latest_error,
        patches = state.patches.len(),
        status = state.status,
    )
}

fn execution_fields(result: Option<&ExecutionResult>) -> (&str, &str, i32) {
    result
        .map(|r| (r.stdout.as_str(), r.stderr.as_str(), r.exit_code))
        .unwrap_or(("", "", 0))
}
