// SQL文の分割
//
// マイグレーションファイルの本文を個々の文に分割します。
// 文字列リテラル、引用符付き識別子、ドル引用（$tag$...$tag$）、
// 行コメント、ブロックコメントの内側にある `;` では分割しません。

/// SQLスクリプトを文のリストに分割する
///
/// 空の文（コメントのみを含むものを除く）は結果に含めません。
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' => {
                has_code = true;
                current.push(c);
                // 同じ引用符の連続（''）はエスケープとして読み飛ばす
                while let Some((_, next)) = chars.next() {
                    current.push(next);
                    if next == c {
                        if matches!(chars.peek(), Some((_, n)) if *n == c) {
                            if let Some((_, escaped)) = chars.next() {
                                current.push(escaped);
                            }
                            continue;
                        }
                        break;
                    }
                }
            }
            '-' if matches!(chars.peek(), Some((_, '-'))) => {
                // 行コメント
                current.push(c);
                for (_, next) in chars.by_ref() {
                    current.push(next);
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                // ブロックコメント
                current.push(c);
                let mut prev = '\0';
                for (_, next) in chars.by_ref() {
                    current.push(next);
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '$' => {
                has_code = true;
                match dollar_quote_tag(&sql[i..]) {
                    Some(tag) => {
                        let body_start = i + tag.len();
                        let end = sql[body_start..]
                            .find(tag)
                            .map(|pos| body_start + pos + tag.len())
                            .unwrap_or(sql.len());
                        current.push_str(&sql[i..end]);
                        while matches!(chars.peek(), Some((j, _)) if *j < end) {
                            chars.next();
                        }
                    }
                    None => current.push(c),
                }
            }
            ';' => {
                if has_code {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                has_code = false;
            }
            _ => {
                if !c.is_whitespace() {
                    has_code = true;
                }
                current.push(c);
            }
        }
    }

    if has_code {
        statements.push(current.trim().to_string());
    }

    statements
}

/// `$tag$` 形式のドル引用開始タグを取り出す
fn dollar_quote_tag(rest: &str) -> Option<&str> {
    let end = rest[1..].find('$')? + 1;
    let inner = &rest[1..end];
    let valid = inner
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        && !inner.starts_with(|ch: char| ch.is_ascii_digit());

    valid.then(|| &rest[..=end])
}
