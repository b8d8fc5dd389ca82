//! Test data builders for creating node scripts

/// Helpers every built script carries. `this.bump(key)` increments a counter
/// kept on the context's state object, `this.tally(key)` reads it.
const COUNTERS: &str = r#"
fn bump(key) {
    let n = this[key];
    this[key] = if type_of(n) == "()" { 1 } else { n + 1 };
}

fn tally(key) {
    let n = this[key];
    if type_of(n) == "()" { 0 } else { n }
}
"#;

/// Builder for node scripts
#[derive(Debug, Clone, Default)]
pub struct ScriptBuilder {
    io: Option<[i64; 4]>,
    params: Vec<(String, String)>,
    prepare: Option<String>,
    release: Option<String>,
    render: String,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare audio in/out and MIDI in/out counts
    pub fn io(mut self, audio_ins: i64, audio_outs: i64, midi_ins: i64, midi_outs: i64) -> Self {
        self.io = Some([audio_ins, audio_outs, midi_ins, midi_outs]);
        self
    }

    /// Add a parameter with the given flow
    pub fn param(mut self, name: &str, flow: &str) -> Self {
        self.params.push((name.to_string(), flow.to_string()));
        self
    }

    pub fn prepare(mut self, body: &str) -> Self {
        self.prepare = Some(body.to_string());
        self
    }

    pub fn release(mut self, body: &str) -> Self {
        self.release = Some(body.to_string());
        self
    }

    pub fn render(mut self, body: &str) -> Self {
        self.render = body.to_string();
        self
    }

    /// Count prepare and release calls as `prepares` / `releases`
    pub fn counting(self) -> Self {
        self.prepare(r#"this.bump("prepares");"#)
            .release(r#"this.bump("releases");"#)
    }

    pub fn build(&self) -> String {
        let mut source = String::from(COUNTERS);

        if let Some([ai, ao, mi, mo]) = self.io {
            source.push_str(&format!(
                "\nfn node_io_ports() {{\n    #{{ audio_ins: {}, audio_outs: {}, midi_ins: {}, midi_outs: {} }}\n}}\n",
                ai, ao, mi, mo
            ));
        }

        if !self.params.is_empty() {
            let entries: Vec<String> = self
                .params
                .iter()
                .map(|(name, flow)| format!("        #{{ name: \"{}\", flow: \"{}\" }}", name, flow))
                .collect();
            source.push_str(&format!(
                "\nfn node_params() {{\n    [\n{}\n    ]\n}}\n",
                entries.join(",\n")
            ));
        }

        if let Some(body) = &self.prepare {
            source.push_str(&format!("\nfn node_prepare(rate, block) {{\n    {}\n}}\n", body));
        }
        if let Some(body) = &self.release {
            source.push_str(&format!("\nfn node_release() {{\n    {}\n}}\n", body));
        }
        source.push_str(&format!("\nfn node_render(audio, midi) {{\n    {}\n}}\n", self.render));
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_builder() {
        let source = ScriptBuilder::new()
            .io(1, 2, 0, 0)
            .param("Gain", "input")
            .counting()
            .render("audio.clear();")
            .build();

        assert!(source.contains("audio_ins: 1, audio_outs: 2"));
        assert!(source.contains("name: \"Gain\", flow: \"input\""));
        assert!(source.contains("this.bump(\"prepares\");"));
        assert!(source.contains("fn node_render(audio, midi) {\n    audio.clear();"));
    }
}
