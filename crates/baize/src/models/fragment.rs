use serde::{Deserialize, Serialize};

/// One increment of a streaming model response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Fragment {
    /// More response text
    TextFragment { text: String },
    /// A tool invocation; `arguments_so_far` is the cumulative raw JSON text of
    /// the arguments received for this id so far
    ToolCallFragment {
        id: String,
        name: String,
        #[serde(rename = "argumentsSoFar", default)]
        arguments_so_far: String,
    },
    /// A fragment kind this crate does not understand
    #[serde(other)]
    Unknown,
}

impl Fragment {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Fragment::TextFragment { text: text.into() }
    }

    pub fn tool_call<I, N, A>(id: I, name: N, arguments_so_far: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Fragment::ToolCallFragment {
            id: id.into(),
            name: name.into(),
            arguments_so_far: arguments_so_far.into(),
        }
    }
}
