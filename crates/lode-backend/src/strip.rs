//! The built-in `strip` backend: a line-preserving type-annotation stripper.
//!
//! Handles the annotated-superset constructs that have no runtime meaning
//! (annotations, interfaces, type aliases, `declare` statements, `as`
//! assertions) by deleting them while keeping every line of the input on the
//! same output line, recording a position mapping at the start of every
//! retained segment. Optionally rewrites static imports/exports to CommonJS
//! and lowers simple markup expressions to factory calls.
//!
//! Constructs that would need real lowering (enums, namespaces, nested
//! markup) are rejected with diagnostics rather than emitted wrong.

use lode_sourcemap::PositionMapBuilder;

use crate::error::{BackendError, Diagnostic};
use crate::options::{BackendOptions, ModuleKind, OutputLevel};
use crate::registry::{Backend, BackendOutput};

/// Type-stripping backend. `max_level` bounds the output levels it accepts,
/// which is what capability probing discovers.
#[derive(Debug)]
pub struct StripBackend {
    max_level: OutputLevel,
}

impl StripBackend {
    pub fn new() -> Self {
        Self {
            max_level: OutputLevel::EsNext,
        }
    }

    /// A backend that rejects levels above `max_level`. Used to model
    /// backends with limited capability.
    pub fn with_max_level(max_level: OutputLevel) -> Self {
        Self { max_level }
    }
}

impl Default for StripBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for StripBackend {
    fn name(&self) -> &str {
        "strip"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn transpile(
        &self,
        source: &str,
        file: &str,
        options: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        if options.level > self.max_level {
            return Err(BackendError::UnsupportedLevel {
                backend: self.name().to_string(),
                level: options.level,
            });
        }

        let mut stripper = Stripper::new(source, file, options);
        if options.use_strict_prologue {
            stripper.emit_raw_line("\"use strict\";");
        }
        stripper.run();

        if !stripper.diagnostics.is_empty() {
            return Err(BackendError::Diagnostics(stripper.diagnostics));
        }

        let mut compiled_text = stripper.out;
        if options.module_kind == ModuleKind::CommonJs && !stripper.exports.is_empty() {
            if !compiled_text.ends_with('\n') {
                compiled_text.push('\n');
            }
            for name in &stripper.exports {
                compiled_text.push_str(&format!("exports.{} = {};\n", name, name));
            }
        }

        Ok(BackendOutput {
            compiled_text,
            position_map: stripper.map.finish(),
        })
    }
}

/// Single-pass scanner over the source characters.
struct Stripper<'a> {
    chars: Vec<char>,
    i: usize,
    /// Current original position, 1-based
    line: u32,
    col: u32,

    out: String,
    map: PositionMapBuilder,
    gen_line: u32,
    gen_col: u32,
    /// A mapping entry is due at the next emitted character
    pending_map: bool,

    /// Open bracket context, innermost last
    brackets: Vec<char>,
    /// Pending ternary `?` count, saved and restored per bracket frame
    ternary_depth: u32,
    ternary_stack: Vec<u32>,
    after_case: bool,
    stmt_start: bool,
    prev_word: String,
    last_word: String,
    last_significant: Option<char>,

    file: &'a str,
    cjs: bool,
    jsx_factory: Option<&'a str>,
    decorators: bool,

    /// Names to re-export as `exports.<name>` in CommonJS output
    exports: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Stripper<'a> {
    fn new(source: &str, file: &'a str, options: &'a BackendOptions) -> Self {
        Self {
            chars: source.chars().collect(),
            i: 0,
            line: 1,
            col: 1,
            out: String::with_capacity(source.len()),
            map: PositionMapBuilder::new(file),
            gen_line: 1,
            gen_col: 1,
            pending_map: true,
            brackets: Vec::new(),
            ternary_depth: 0,
            ternary_stack: Vec::new(),
            after_case: false,
            stmt_start: true,
            prev_word: String::new(),
            last_word: String::new(),
            last_significant: None,
            file,
            cjs: options.module_kind == ModuleKind::CommonJs,
            jsx_factory: options.jsx_factory.as_deref(),
            decorators: options.decorators,
            exports: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    // ---- emit primitives -------------------------------------------------

    /// Emit a synthetic line (no mapping) before any source output
    fn emit_raw_line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
        self.gen_line += 1;
        self.gen_col = 1;
    }

    fn emit(&mut self, c: char) {
        if c == '\n' {
            self.out.push('\n');
            self.gen_line += 1;
            self.gen_col = 1;
            self.pending_map = true;
            return;
        }
        if self.pending_map {
            self.map
                .add_mapping(self.gen_line, self.gen_col, self.line, self.col);
            self.pending_map = false;
        }
        self.out.push(c);
        self.gen_col += 1;
    }

    /// Emit rewritten text mapped to an original position
    fn emit_mapped(&mut self, text: &str, orig_line: u32, orig_col: u32) {
        if text.is_empty() {
            return;
        }
        self.map
            .add_mapping(self.gen_line, self.gen_col, orig_line, orig_col);
        self.pending_map = true;
        for c in text.chars() {
            debug_assert_ne!(c, '\n');
            self.out.push(c);
            self.gen_col += 1;
        }
    }

    fn bump_pos(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
    }

    /// Consume the current character and emit it
    fn eat_emit(&mut self) {
        let c = self.chars[self.i];
        self.emit(c);
        if !c.is_whitespace() {
            self.last_significant = Some(c);
        }
        self.bump_pos(c);
        self.i += 1;
    }

    /// Consume the current character without emitting it. Newlines are still
    /// emitted so the output keeps the input's line structure.
    fn eat_skip(&mut self) {
        let c = self.chars[self.i];
        if c == '\n' {
            self.emit('\n');
        } else {
            self.pending_map = true;
        }
        self.bump_pos(c);
        self.i += 1;
    }

    // ---- lookahead helpers ----------------------------------------------

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.i + ahead).copied()
    }

    fn at_end(&self) -> bool {
        self.i >= self.chars.len()
    }

    fn peek_non_ws(&self) -> Option<char> {
        self.chars[self.i..]
            .iter()
            .copied()
            .find(|c| !c.is_whitespace())
    }

    /// The identifier word starting at the current position, if any
    fn peek_word(&self) -> Option<String> {
        let first = self.peek(0)?;
        if !is_ident_start(first) {
            return None;
        }
        let word: String = self.chars[self.i..]
            .iter()
            .take_while(|c| is_ident_char(**c))
            .collect();
        Some(word)
    }

    /// Word starting at the first non-whitespace position at or after `i`
    fn peek_word_after_ws(&self) -> Option<String> {
        let mut j = self.i;
        while j < self.chars.len() && self.chars[j].is_whitespace() {
            j += 1;
        }
        let first = self.chars.get(j)?;
        if !is_ident_start(*first) {
            return None;
        }
        Some(
            self.chars[j..]
                .iter()
                .take_while(|c| is_ident_char(**c))
                .collect(),
        )
    }

    fn error(&mut self, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            file: self.file.to_string(),
            line: self.line,
            column: self.col,
            message: message.into(),
        });
    }

    // ---- main loop -------------------------------------------------------

    fn run(&mut self) {
        while !self.at_end() {
            let c = self.chars[self.i];
            match c {
                '/' if self.peek(1) == Some('/') => self.consume_line_comment(),
                '/' if self.peek(1) == Some('*') => self.consume_block_comment(),
                '"' | '\'' => self.consume_string(c, true),
                '`' => self.consume_template(),
                '@' if self.stmt_start => self.handle_decorator(),
                ':' => self.handle_colon(),
                '?' => self.handle_question(),
                '!' => self.handle_bang(),
                '<' => self.handle_angle(),
                '(' | '[' | '{' => {
                    self.brackets.push(c);
                    self.ternary_stack.push(self.ternary_depth);
                    self.ternary_depth = 0;
                    self.eat_emit();
                    self.stmt_start = c == '{';
                }
                ')' | ']' | '}' => {
                    self.brackets.pop();
                    self.ternary_depth = self.ternary_stack.pop().unwrap_or(0);
                    self.eat_emit();
                    self.stmt_start = c == '}';
                }
                ';' => {
                    self.eat_emit();
                    self.stmt_start = true;
                    self.ternary_depth = 0;
                }
                c if is_ident_start(c) => self.handle_word(),
                c if c.is_whitespace() => self.eat_emit(),
                _ => {
                    self.eat_emit();
                    self.stmt_start = false;
                }
            }
        }
        if !self.brackets.is_empty() {
            self.error("unbalanced brackets at end of file");
        }
    }

    // ---- comments, strings, templates ------------------------------------

    fn consume_line_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.eat_emit();
        }
    }

    fn consume_block_comment(&mut self) {
        self.eat_emit(); // '/'
        self.eat_emit(); // '*'
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some('*'), Some('/')) => {
                    self.eat_emit();
                    self.eat_emit();
                    return;
                }
                (Some(_), _) => self.eat_emit(),
                (None, _) => {
                    self.error("unterminated block comment");
                    return;
                }
            }
        }
    }

    /// Consume a quoted string. With `emit` false the characters are
    /// discarded (used while skipping type positions).
    fn consume_string(&mut self, quote: char, emit: bool) {
        let eat = |s: &mut Self| if emit { s.eat_emit() } else { s.eat_skip() };
        eat(self); // opening quote
        loop {
            match self.peek(0) {
                Some('\\') => {
                    eat(self);
                    if self.peek(0).is_some() {
                        eat(self);
                    }
                }
                Some(c) if c == quote => {
                    eat(self);
                    return;
                }
                Some('\n') | None => {
                    self.error("unterminated string literal");
                    return;
                }
                Some(_) => eat(self),
            }
        }
    }

    fn consume_template(&mut self) {
        self.eat_emit(); // backtick
        let mut interp_depth = 0usize;
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some('\\'), _) => {
                    self.eat_emit();
                    if self.peek(0).is_some() {
                        self.eat_emit();
                    }
                }
                (Some('$'), Some('{')) => {
                    interp_depth += 1;
                    self.eat_emit();
                    self.eat_emit();
                }
                (Some('{'), _) if interp_depth > 0 => {
                    interp_depth += 1;
                    self.eat_emit();
                }
                (Some('}'), _) if interp_depth > 0 => {
                    interp_depth -= 1;
                    self.eat_emit();
                }
                (Some('`'), _) if interp_depth == 0 => {
                    self.eat_emit();
                    return;
                }
                (Some(_), _) => self.eat_emit(),
                (None, _) => {
                    self.error("unterminated template literal");
                    return;
                }
            }
        }
    }

    // ---- punctuation handlers --------------------------------------------

    fn handle_colon(&mut self) {
        if self.after_case {
            self.after_case = false;
            self.eat_emit();
            return;
        }
        if self.ternary_depth > 0 {
            self.ternary_depth -= 1;
            self.eat_emit();
            return;
        }
        match self.brackets.last() {
            // Object literal / block: a real colon
            Some('{') | Some('[') => self.eat_emit(),
            // Parameter list: annotation until ',' / ')' / '='
            Some('(') => self.skip_type(&[',', ')', '='], false),
            // Statement level: annotation until initializer, body or end
            None => self.skip_type(&['=', ';', ',', ')'], true),
            Some(_) => self.eat_emit(),
        }
    }

    fn handle_question(&mut self) {
        match self.peek(1) {
            Some('?') | Some('.') => {
                self.eat_emit();
                self.eat_emit();
                return;
            }
            _ => {}
        }
        // Optional-parameter marker: '?' directly before ':', ',' or ')'
        if self.brackets.last() == Some(&'(') {
            let mut j = self.i + 1;
            while j < self.chars.len() && self.chars[j].is_whitespace() {
                j += 1;
            }
            if matches!(self.chars.get(j), Some(':') | Some(',') | Some(')')) {
                self.eat_skip();
                return;
            }
        }
        self.ternary_depth += 1;
        self.eat_emit();
    }

    fn handle_bang(&mut self) {
        // Non-null assertion or definite-assignment marker, never logical
        // not: previous significant char must end an expression.
        let postfix = matches!(
            self.last_significant,
            Some(c) if is_ident_char(c) || c == ')' || c == ']'
        );
        if postfix && self.peek(1) != Some('=') {
            self.eat_skip();
        } else {
            self.eat_emit();
        }
    }

    fn handle_angle(&mut self) {
        // Declaration type parameters: directly after a name introduced by
        // `function` or `class`.
        let after_decl_name = matches!(self.last_significant, Some(c) if is_ident_char(c))
            && matches!(self.prev_word.as_str(), "function" | "class");
        if after_decl_name {
            self.skip_balanced_angles();
            return;
        }
        if self.jsx_factory.is_some() && self.in_expression_position() {
            if let Some(next) = self.peek(1) {
                if is_ident_start(next) {
                    self.lower_markup();
                    return;
                }
            }
        }
        self.eat_emit();
        self.stmt_start = false;
    }

    fn in_expression_position(&self) -> bool {
        if self.last_word == "return" {
            return true;
        }
        match self.last_significant {
            None => true,
            Some(c) => matches!(c, '(' | ',' | '=' | '?' | ':' | '{' | ';' | '[' | '&' | '|' | '>'),
        }
    }

    fn skip_balanced_angles(&mut self) {
        let mut depth = 0usize;
        while let Some(c) = self.peek(0) {
            match c {
                '<' => {
                    depth += 1;
                    self.eat_skip();
                }
                // An arrow type's `=>` must not close the list.
                '=' if self.peek(1) == Some('>') => {
                    self.eat_skip();
                    self.eat_skip();
                }
                '>' => {
                    depth -= 1;
                    self.eat_skip();
                    if depth == 0 {
                        return;
                    }
                }
                '"' | '\'' => self.consume_string(c, false),
                _ => self.eat_skip(),
            }
        }
        self.error("unterminated type parameter list");
    }

    /// Skip a type expression up to (not including) a stop character at
    /// nesting depth zero. The cursor may sit on the introducing ':', which
    /// is consumed.
    ///
    /// With `brace_ends` set, a '{' at depth zero ends the annotation (a
    /// function body follows) unless it begins an object type, i.e. it is
    /// the first token of the type or follows a type operator.
    fn skip_type(&mut self, stops: &[char], brace_ends: bool) {
        if self.peek(0) == Some(':') {
            self.eat_skip();
        }
        let mut depth = 0usize;
        let mut prev_type_char: Option<char> = None;
        while let Some(c) = self.peek(0) {
            if depth == 0 {
                if stops.contains(&c) {
                    return;
                }
                // Leave trailing whitespace before the stop to the caller so
                // `x: T = 1` keeps its spacing around '='.
                if c.is_whitespace() && c != '\n' {
                    if let Some(next) = self.peek_non_ws() {
                        if stops.contains(&next) {
                            return;
                        }
                        if next == '{' && brace_ends && !type_continues(prev_type_char) {
                            return;
                        }
                    }
                }
                if c == '{' && brace_ends && !type_continues(prev_type_char) {
                    return;
                }
            }
            match c {
                '<' | '(' | '[' | '{' => {
                    depth += 1;
                    prev_type_char = Some(c);
                    self.eat_skip();
                }
                '>' | ')' | ']' | '}' => {
                    if depth == 0 {
                        // Closing bracket of the enclosing context; the
                        // annotation ends here.
                        return;
                    }
                    depth -= 1;
                    prev_type_char = Some(c);
                    self.eat_skip();
                }
                '"' | '\'' => {
                    prev_type_char = Some(c);
                    self.consume_string(c, false);
                }
                '=' if self.peek(1) == Some('>') => {
                    // Function-type arrow inside the annotation
                    prev_type_char = Some('>');
                    self.eat_skip();
                    self.eat_skip();
                }
                c if c.is_whitespace() => self.eat_skip(),
                _ => {
                    prev_type_char = Some(c);
                    self.eat_skip();
                }
            }
        }
    }

    // ---- word / statement handlers ---------------------------------------

    fn handle_word(&mut self) {
        let word = self.peek_word().unwrap_or_default();

        if self.stmt_start {
            match word.as_str() {
                "interface" => {
                    if self
                        .word_after(&word)
                        .map(|w| is_ident_start(w.chars().next().unwrap_or(' ')))
                        .unwrap_or(false)
                    {
                        self.skip_interface_decl();
                        return;
                    }
                }
                "type" => {
                    if self.is_type_alias() {
                        self.skip_statement();
                        return;
                    }
                }
                "declare" => {
                    self.skip_declare();
                    return;
                }
                "import" => {
                    // Dynamic `import(...)` is an expression, not a
                    // declaration.
                    if self.char_after(&word) != Some('(') {
                        self.handle_import();
                        return;
                    }
                }
                "export" => {
                    self.handle_export();
                    return;
                }
                "enum" => {
                    self.error("enum declarations are not supported by the strip backend");
                    self.skip_statement();
                    return;
                }
                "namespace" | "module" => {
                    if self
                        .word_after(&word)
                        .map(|w| is_ident_start(w.chars().next().unwrap_or(' ')))
                        .unwrap_or(false)
                    {
                        self.error(format!(
                            "{} declarations are not supported by the strip backend",
                            word
                        ));
                        self.skip_statement();
                        return;
                    }
                }
                "abstract" => {
                    self.skip_word();
                    return;
                }
                _ => {}
            }
        }

        match word.as_str() {
            "as" | "satisfies" if !self.stmt_start => {
                self.skip_word();
                self.skip_type(&['=', ';', ',', ')', '}', ']'], false);
                return;
            }
            "case" => self.after_case = true,
            "default" if self.stmt_start => self.after_case = true,
            _ => {}
        }

        self.emit_word();
    }

    /// Emit the word at the cursor and update word history
    fn emit_word(&mut self) {
        let word = self.peek_word().unwrap_or_default();
        for _ in 0..word.chars().count() {
            self.eat_emit();
        }
        self.prev_word = std::mem::take(&mut self.last_word);
        self.last_word = word;
        self.stmt_start = false;
    }

    /// Skip the word at the cursor and any following whitespace on the line
    fn skip_word(&mut self) {
        let word = self.peek_word().unwrap_or_default();
        for _ in 0..word.chars().count() {
            self.eat_skip();
        }
        while matches!(self.peek(0), Some(c) if c.is_whitespace() && c != '\n') {
            self.eat_skip();
        }
    }

    fn char_after(&self, word: &str) -> Option<char> {
        let mut j = self.i + word.chars().count();
        while j < self.chars.len() && self.chars[j].is_whitespace() {
            j += 1;
        }
        self.chars.get(j).copied()
    }

    fn word_after(&self, word: &str) -> Option<String> {
        let mut j = self.i + word.chars().count();
        while j < self.chars.len() && self.chars[j].is_whitespace() {
            j += 1;
        }
        let first = self.chars.get(j)?;
        if !is_ident_start(*first) {
            return None;
        }
        Some(
            self.chars[j..]
                .iter()
                .take_while(|c| is_ident_char(**c))
                .collect(),
        )
    }

    /// `type X = ...` (possibly `type X<T> = ...`) as opposed to a variable
    /// named `type`
    fn is_type_alias(&self) -> bool {
        let mut j = self.i + 4;
        while j < self.chars.len() && self.chars[j].is_whitespace() {
            j += 1;
        }
        match self.chars.get(j) {
            Some(c) if is_ident_start(*c) => {}
            _ => return false,
        }
        while j < self.chars.len() && is_ident_char(self.chars[j]) {
            j += 1;
        }
        while j < self.chars.len() && self.chars[j].is_whitespace() {
            j += 1;
        }
        matches!(self.chars.get(j), Some('=') | Some('<'))
    }

    /// Skip `interface Name ... { ... }` entirely
    fn skip_interface_decl(&mut self) {
        // Header up to the opening brace
        while let Some(c) = self.peek(0) {
            match c {
                '{' => break,
                '"' | '\'' => self.consume_string(c, false),
                _ => self.eat_skip(),
            }
        }
        if self.at_end() {
            self.error("unterminated interface declaration");
            return;
        }
        let mut depth = 0usize;
        while let Some(c) = self.peek(0) {
            match c {
                '{' => {
                    depth += 1;
                    self.eat_skip();
                }
                '}' => {
                    depth -= 1;
                    self.eat_skip();
                    if depth == 0 {
                        self.stmt_start = true;
                        return;
                    }
                }
                '"' | '\'' => self.consume_string(c, false),
                _ => self.eat_skip(),
            }
        }
        self.error("unterminated interface declaration");
    }

    /// Skip a full statement: to ';' at depth zero, or a balanced block
    fn skip_statement(&mut self) {
        let mut depth = 0usize;
        while let Some(c) = self.peek(0) {
            match c {
                '{' | '(' | '[' | '<' => {
                    depth += 1;
                    self.eat_skip();
                }
                '}' | ')' | ']' | '>' => {
                    if c == '}' && depth == 1 {
                        self.eat_skip();
                        // Block statements may omit the semicolon
                        if self.peek_non_ws() == Some(';') {
                            continue;
                        }
                        self.stmt_start = true;
                        return;
                    }
                    depth = depth.saturating_sub(1);
                    self.eat_skip();
                }
                ';' if depth == 0 => {
                    self.eat_skip();
                    self.stmt_start = true;
                    return;
                }
                '"' | '\'' => self.consume_string(c, false),
                _ => self.eat_skip(),
            }
        }
    }

    fn skip_declare(&mut self) {
        self.skip_statement();
    }

    fn handle_decorator(&mut self) {
        if !self.decorators {
            self.error("decorator syntax is not enabled for this instance");
        }
        self.eat_skip(); // '@'
        self.skip_word();
        // Optional call arguments
        if self.peek(0) == Some('(') {
            let mut depth = 0usize;
            while let Some(c) = self.peek(0) {
                match c {
                    '(' => {
                        depth += 1;
                        self.eat_skip();
                    }
                    ')' => {
                        depth -= 1;
                        self.eat_skip();
                        if depth == 0 {
                            break;
                        }
                    }
                    '"' | '\'' => self.consume_string(c, false),
                    _ => self.eat_skip(),
                }
            }
        }
        // A decorator alone on its line leaves a blank line behind
        while matches!(self.peek(0), Some(c) if c.is_whitespace() && c != '\n') {
            self.eat_skip();
        }
    }

    // ---- import / export -------------------------------------------------

    /// Collect a whole import/export statement as text, consuming it. Ends
    /// at ';' (included) or at a newline outside brackets and strings.
    fn collect_statement(&mut self) -> (String, u32, u32) {
        let start_line = self.line;
        let start_col = self.col;
        let mut text = String::new();
        let mut depth = 0usize;
        while let Some(c) = self.peek(0) {
            match c {
                ';' if depth == 0 => {
                    text.push(';');
                    self.eat_skip();
                    break;
                }
                '\n' if depth == 0 => {
                    self.eat_skip();
                    break;
                }
                '{' | '(' => {
                    depth += 1;
                    text.push(c);
                    self.eat_skip();
                }
                '}' | ')' => {
                    depth = depth.saturating_sub(1);
                    text.push(c);
                    self.eat_skip();
                }
                '"' | '\'' => {
                    // Inline string capture keeps escapes verbatim
                    text.push(c);
                    self.eat_skip();
                    while let Some(sc) = self.peek(0) {
                        text.push(sc);
                        if sc == '\\' {
                            self.eat_skip();
                            if let Some(esc) = self.peek(0) {
                                text.push(esc);
                                self.eat_skip();
                            }
                            continue;
                        }
                        self.eat_skip();
                        if sc == c {
                            break;
                        }
                    }
                }
                '\n' => {
                    text.push(' ');
                    self.eat_skip();
                }
                _ => {
                    text.push(c);
                    self.eat_skip();
                }
            }
        }
        (text, start_line, start_col)
    }

    fn handle_import(&mut self) {
        let (stmt, line, col) = self.collect_statement();
        let trimmed = stmt.trim();

        // Type-only imports vanish entirely
        if trimmed.starts_with("import type") && self.char_boundary_after(trimmed, 11) {
            self.stmt_start = true;
            return;
        }

        let emitted = if self.cjs {
            match rewrite_import_to_cjs(trimmed) {
                Some(text) => text,
                None => {
                    self.diagnostics.push(Diagnostic {
                        file: self.file.to_string(),
                        line,
                        column: col,
                        message: format!("unsupported import form: {}", trimmed),
                    });
                    return;
                }
            }
        } else {
            filter_type_specifiers(trimmed)
        };
        self.emit_mapped(&emitted, line, col);
        self.stmt_start = true;
    }

    fn char_boundary_after(&self, text: &str, len: usize) -> bool {
        text.chars().nth(len).map(|c| !is_ident_char(c)).unwrap_or(true)
    }

    fn handle_export(&mut self) {
        let next = self.word_after("export");
        match next.as_deref() {
            Some("type") | Some("interface") | Some("declare") => {
                // Type-only exports vanish; `export interface` needs the
                // balanced-brace skip.
                if next.as_deref() == Some("interface") {
                    self.skip_interface_decl();
                } else {
                    self.skip_statement();
                }
                return;
            }
            _ => {}
        }

        if !self.cjs {
            // ESM passthrough; a brace clause may carry type specifiers.
            if self.char_after("export") == Some('{') || self.char_after("export") == Some('*') {
                let (stmt, line, col) = self.collect_statement();
                let filtered = filter_type_specifiers(stmt.trim());
                self.emit_mapped(&filtered, line, col);
                self.stmt_start = true;
            } else {
                self.emit_word();
            }
            return;
        }

        match (next.as_deref(), self.char_after("export")) {
            (Some("default"), _) => {
                let line = self.line;
                let col = self.col;
                self.skip_word(); // export
                self.skip_word(); // default
                self.emit_mapped("exports.default = ", line, col);
            }
            (_, Some('{')) | (_, Some('*')) => {
                let (stmt, line, col) = self.collect_statement();
                match rewrite_export_clause_to_cjs(stmt.trim()) {
                    Some(text) => self.emit_mapped(&text, line, col),
                    None => self.diagnostics.push(Diagnostic {
                        file: self.file.to_string(),
                        line,
                        column: col,
                        message: format!("unsupported export form: {}", stmt.trim()),
                    }),
                }
                self.stmt_start = true;
            }
            _ => {
                // `export <decl>`: drop the keyword, remember the declared
                // name for the exports trailer.
                self.skip_word();
                let mut decl = self.peek_word().unwrap_or_default();
                if decl == "async" {
                    let name_after = self.word_after("async");
                    if name_after.as_deref() == Some("function") {
                        decl = "function".to_string();
                    }
                }
                let name = match decl.as_str() {
                    "const" | "let" | "var" | "function" | "class" => {
                        self.declared_name_after(&decl)
                    }
                    _ => None,
                };
                if let Some(name) = name {
                    self.exports.push(name);
                }
                // The declaration itself is scanned normally.
            }
        }
    }

    /// First identifier following the declaration keyword(s) at the cursor
    fn declared_name_after(&self, _decl: &str) -> Option<String> {
        let mut j = self.i;
        let mut words = Vec::new();
        let len = self.chars.len();
        while j < len && words.len() < 3 {
            while j < len && !is_ident_start(self.chars[j]) {
                if self.chars[j] == '=' || self.chars[j] == '(' {
                    break;
                }
                j += 1;
            }
            if j >= len || !is_ident_start(self.chars[j]) {
                break;
            }
            let start = j;
            while j < len && is_ident_char(self.chars[j]) {
                j += 1;
            }
            let word: String = self.chars[start..j].iter().collect();
            let keyword = matches!(
                word.as_str(),
                "const" | "let" | "var" | "function" | "class" | "async"
            );
            if !keyword {
                return Some(word);
            }
            words.push(word);
        }
        None
    }
}

// ---- statement rewriting helpers ----------------------------------------

/// Rewrite a static `import` statement to CommonJS `require` form
fn rewrite_import_to_cjs(stmt: &str) -> Option<String> {
    let body = stmt.strip_prefix("import")?.trim().trim_end_matches(';').trim();

    // Side-effect import: `import "m"`
    if body.starts_with('"') || body.starts_with('\'') {
        return Some(format!("require({});", body));
    }

    let from_pos = find_from_keyword(body)?;
    let clause = body[..from_pos].trim();
    let spec = body[from_pos + 4..].trim();

    if clause.starts_with('{') {
        let inner = clause.trim_start_matches('{').trim_end_matches('}');
        let names: Vec<String> = inner
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.starts_with("type "))
            .map(|s| match s.split_once(" as ") {
                Some((orig, local)) => format!("{}: {}", orig.trim(), local.trim()),
                None => s.to_string(),
            })
            .collect();
        if names.is_empty() {
            return Some(format!("require({});", spec));
        }
        return Some(format!("const {{ {} }} = require({});", names.join(", "), spec));
    }

    if let Some(ns) = clause.strip_prefix("* as ") {
        return Some(format!("const {} = require({});", ns.trim(), spec));
    }

    // `import Default from "m"` or `import Default, { a } from "m"`
    match clause.split_once(',') {
        None => {
            if clause.chars().all(is_ident_char) && !clause.is_empty() {
                Some(format!("const {} = require({});", clause, spec))
            } else {
                None
            }
        }
        Some((default, rest)) => {
            let default = default.trim();
            let rest_stmt = format!("import {} from {};", rest.trim(), spec);
            let rest_rewritten = rewrite_import_to_cjs(&rest_stmt)?;
            Some(format!(
                "const {} = require({}); {}",
                default, spec, rest_rewritten
            ))
        }
    }
}

/// Rewrite `export {...}` / `export * from` clauses to CommonJS
fn rewrite_export_clause_to_cjs(stmt: &str) -> Option<String> {
    let body = stmt.strip_prefix("export")?.trim().trim_end_matches(';').trim();

    if let Some(rest) = body.strip_prefix('*') {
        let spec = rest.trim().strip_prefix("from")?.trim();
        return Some(format!("Object.assign(exports, require({}));", spec));
    }

    if !body.starts_with('{') {
        return None;
    }
    let close = body.find('}')?;
    let inner = &body[1..close];
    let source = body[close + 1..]
        .trim()
        .strip_prefix("from")
        .map(|s| s.trim().to_string());

    let mut parts = Vec::new();
    if let Some(spec) = &source {
        parts.push(format!("const __reexport = require({});", spec));
    }
    for entry in inner.split(',') {
        let entry = entry.trim();
        if entry.is_empty() || entry.starts_with("type ") {
            continue;
        }
        let (orig, exported) = match entry.split_once(" as ") {
            Some((o, e)) => (o.trim(), e.trim()),
            None => (entry, entry),
        };
        match &source {
            Some(_) => parts.push(format!("exports.{} = __reexport.{};", exported, orig)),
            None => parts.push(format!("exports.{} = {};", exported, orig)),
        }
    }
    Some(parts.join(" "))
}

/// Drop `type` specifiers from an ESM import/export brace clause
fn filter_type_specifiers(stmt: &str) -> String {
    let (Some(open), Some(close)) = (stmt.find('{'), stmt.rfind('}')) else {
        return stmt.to_string();
    };
    let inner = &stmt[open + 1..close];
    let kept: Vec<&str> = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with("type "))
        .collect();
    format!("{}{{ {} }}{}", &stmt[..open], kept.join(", "), &stmt[close + 1..])
}

/// `from` at word boundaries, outside strings (clauses never contain strings)
fn find_from_keyword(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut search = 0;
    while let Some(rel) = body[search..].find("from") {
        let pos = search + rel;
        let before_ok = pos == 0 || !is_ident_char(bytes[pos - 1] as char);
        let after_ok = pos + 4 >= body.len() || !is_ident_char(bytes[pos + 4] as char);
        if before_ok && after_ok {
            return Some(pos);
        }
        search = pos + 4;
    }
    None
}

/// Whether a '{' after this character continues a type expression (object
/// type) rather than opening a function body
fn type_continues(prev: Option<char>) -> bool {
    matches!(prev, None | Some('|') | Some('&') | Some(',') | Some('(') | Some('<'))
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

// ---- markup lowering -----------------------------------------------------

impl<'a> Stripper<'a> {
    /// Lower a single markup element to a factory call.
    ///
    /// Supported: `<Tag a="s" b={expr} c />` and `<Tag ...>text</Tag>` with
    /// plain-text or single `{expr}` children. Nested elements are rejected
    /// with a diagnostic; a full markup-capable backend should be plugged in
    /// for component-heavy code.
    fn lower_markup(&mut self) {
        let start_line = self.line;
        let start_col = self.col;
        let factory = self.jsx_factory.unwrap_or("h").to_string();

        self.eat_skip(); // '<'
        let tag = match self.peek_word() {
            Some(t) => t,
            None => {
                self.error("malformed markup element");
                return;
            }
        };
        for _ in 0..tag.chars().count() {
            self.eat_skip();
        }

        let mut props: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;
        loop {
            while matches!(self.peek(0), Some(c) if c.is_whitespace()) {
                self.eat_skip();
            }
            match self.peek(0) {
                Some('/') if self.peek(1) == Some('>') => {
                    self.eat_skip();
                    self.eat_skip();
                    self_closing = true;
                    break;
                }
                Some('>') => {
                    self.eat_skip();
                    break;
                }
                Some(c) if is_ident_start(c) => {
                    let name = self.peek_word().unwrap_or_default();
                    for _ in 0..name.chars().count() {
                        self.eat_skip();
                    }
                    if self.peek(0) == Some('=') {
                        self.eat_skip();
                        match self.peek(0) {
                            Some('"') | Some('\'') => {
                                let quote = self.chars[self.i];
                                let mut value = String::new();
                                value.push('"');
                                self.eat_skip();
                                while let Some(sc) = self.peek(0) {
                                    if sc == quote {
                                        self.eat_skip();
                                        break;
                                    }
                                    value.push(sc);
                                    self.eat_skip();
                                }
                                value.push('"');
                                props.push((name, value));
                            }
                            Some('{') => {
                                let mut depth = 0usize;
                                let mut value = String::new();
                                while let Some(bc) = self.peek(0) {
                                    match bc {
                                        '{' => {
                                            depth += 1;
                                            if depth > 1 {
                                                value.push(bc);
                                            }
                                            self.eat_skip();
                                        }
                                        '}' => {
                                            depth -= 1;
                                            if depth == 0 {
                                                self.eat_skip();
                                                break;
                                            }
                                            value.push(bc);
                                            self.eat_skip();
                                        }
                                        _ => {
                                            value.push(bc);
                                            self.eat_skip();
                                        }
                                    }
                                }
                                props.push((name, value));
                            }
                            _ => {
                                self.error("malformed markup attribute");
                                return;
                            }
                        }
                    } else {
                        props.push((name, "true".to_string()));
                    }
                }
                _ => {
                    self.error("malformed markup element");
                    return;
                }
            }
        }

        let mut children: Vec<String> = Vec::new();
        if !self_closing {
            let mut text = String::new();
            loop {
                match self.peek(0) {
                    Some('<') if self.peek(1) == Some('/') => {
                        // closing tag
                        while let Some(c) = self.peek(0) {
                            self.eat_skip();
                            if c == '>' {
                                break;
                            }
                        }
                        break;
                    }
                    Some('<') => {
                        self.error("nested markup elements are not supported by the strip backend");
                        return;
                    }
                    Some('{') => {
                        if !text.trim().is_empty() {
                            children.push(format!("{:?}", text.trim()));
                        }
                        text.clear();
                        let mut depth = 0usize;
                        let mut expr = String::new();
                        while let Some(bc) = self.peek(0) {
                            match bc {
                                '{' => {
                                    depth += 1;
                                    if depth > 1 {
                                        expr.push(bc);
                                    }
                                    self.eat_skip();
                                }
                                '}' => {
                                    depth -= 1;
                                    if depth == 0 {
                                        self.eat_skip();
                                        break;
                                    }
                                    expr.push(bc);
                                    self.eat_skip();
                                }
                                _ => {
                                    expr.push(bc);
                                    self.eat_skip();
                                }
                            }
                        }
                        children.push(expr);
                    }
                    Some(c) => {
                        text.push(c);
                        self.eat_skip();
                    }
                    None => {
                        self.error("unterminated markup element");
                        return;
                    }
                }
            }
            if !text.trim().is_empty() {
                children.push(format!("{:?}", text.trim()));
            }
        }

        let tag_ref = if tag.chars().next().map(|c| c.is_lowercase()).unwrap_or(false) {
            format!("{:?}", tag)
        } else {
            tag.clone()
        };
        let props_ref = if props.is_empty() {
            "null".to_string()
        } else {
            let entries: Vec<String> = props
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect();
            format!("{{ {} }}", entries.join(", "))
        };

        let mut call = format!("{}({}, {}", factory, tag_ref, props_ref);
        for child in &children {
            call.push_str(", ");
            call.push_str(child);
        }
        call.push(')');

        self.emit_mapped(&call, start_line, start_col);
        self.last_significant = Some(')');
        self.stmt_start = false;
    }
}
