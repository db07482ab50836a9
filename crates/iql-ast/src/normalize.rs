//! Source normalization ahead of the grammar
//!
//! Language models capitalize boolean keywords freely (`AND`, `Not`), while the
//! grammar is case-sensitive. Outside quoted literals `and`, `or` and `not` are
//! lowercased, and newlines nested inside brackets are blanked so a multi-line
//! call stays one statement. A comment inside brackets is blanked with its
//! newline, otherwise it would run on into the rest of the call. Every rewrite keeps byte length, so spans taken on
//! the normalized text index the original text too.

const KEYWORDS: [&str; 3] = ["and", "or", "not"];

pub fn normalize(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut word = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut in_comment = false;
    let mut depth = 0usize;

    for c in source.chars() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q || c == '\n' {
                quote = None;
            }
            continue;
        }

        if in_comment {
            if c == '\n' {
                in_comment = false;
                push_newline(&mut out, depth);
            } else if depth > 0 {
                blank(&mut out, c);
            } else {
                out.push(c);
            }
            continue;
        }

        if c.is_alphanumeric() || c == '_' {
            word.push(c);
            continue;
        }
        flush_word(&mut word, &mut out);

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '#' => {
                in_comment = true;
                if depth > 0 {
                    blank(&mut out, c);
                } else {
                    out.push(c);
                }
            }
            '(' | '[' | '{' => {
                depth += 1;
                out.push(c);
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                out.push(c);
            }
            '\n' => push_newline(&mut out, depth),
            c => out.push(c),
        }
    }
    flush_word(&mut word, &mut out);
    out
}

fn push_newline(out: &mut String, depth: usize) {
    out.push(if depth > 0 { ' ' } else { '\n' });
}

fn blank(out: &mut String, c: char) {
    out.extend(std::iter::repeat(' ').take(c.len_utf8()));
}

fn flush_word(word: &mut String, out: &mut String) {
    match KEYWORDS.iter().find(|kw| word.eq_ignore_ascii_case(kw)) {
        Some(kw) => out.push_str(kw),
        None => out.push_str(word),
    }
    word.clear();
}
