use std::path::Path;

/// 出力先に同名ファイルがあれば `stem_1.ext`, `stem_2.ext`, ... と空きを探す。
/// 確認時点で存在しない名前を返すだけなので、並行書き込みには対応しない。
pub fn resolve_collision(output_folder: &Path, candidate: &str) -> String {
    if !output_folder.join(candidate).exists() {
        return candidate.to_string();
    }

    let (stem, ext) = split_name(candidate);
    let mut n = 1usize;
    loop {
        let next = format!("{}_{}{}", stem, n, ext);
        if !output_folder.join(&next).exists() {
            return next;
        }
        n += 1;
    }
}

/// 最後の区切り文字より後ろの、最後の `.` で分ける。フォルダ部分は stem 側に残す。
fn split_name(name: &str) -> (&str, &str) {
    let base_start = name.rfind(std::path::is_separator).map_or(0, |i| i + 1);
    let base = &name[base_start..];
    // 先頭のドットは拡張子の区切りとみなさない
    let leading_dots = base.len() - base.trim_start_matches('.').len();
    match base[leading_dots..].rfind('.') {
        Some(dot) => name.split_at(base_start + leading_dots + dot),
        None => (name, ""),
    }
}
