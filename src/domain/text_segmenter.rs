//! 文本分割器
//!
//! 按空白边界把任意长度的文本切成有上限的片段，供后端逐段合成。
//!
//! 分割策略：
//! 1. 以空白为唯一切分点，贪心地把单词装入当前片段
//! 2. 下一个单词放不下时，若当前片段后半部分有句末标点，优先在句末切分
//! 3. 段落分隔（连续两个以上换行）总是切分
//! 4. 单个单词超过上限时按 [`OversizePolicy`] 处理

use std::ops::Range;

use serde::Deserialize;
use thiserror::Error;

/// 默认最大片段长度
pub const DEFAULT_MAX_SEGMENT_LENGTH: usize = 200;

/// 分割错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    #[error("text is empty or contains only whitespace")]
    EmptyText,

    #[error("max segment length must be positive")]
    InvalidMaxLength,
}

/// 长度计量单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    /// Unicode 字符数
    #[default]
    Chars,
    /// UTF-8 字节数
    Bytes,
}

impl LengthUnit {
    #[inline]
    fn measure(self, s: &str) -> usize {
        match self {
            LengthUnit::Chars => s.chars().count(),
            LengthUnit::Bytes => s.len(),
        }
    }
}

/// 超长单词处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizePolicy {
    /// 单独输出为一个超长片段（不截断单词）
    #[default]
    Keep,
    /// 按字符边界硬切成不超过上限的若干片段
    Split,
}

/// 文本分割配置
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// 最大片段长度
    pub max_len: usize,
    /// 计量单位
    pub unit: LengthUnit,
    /// 超长单词策略
    pub oversize: OversizePolicy,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_SEGMENT_LENGTH,
            unit: LengthUnit::Chars,
            oversize: OversizePolicy::Keep,
        }
    }
}

impl SegmentConfig {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            ..Default::default()
        }
    }

    pub fn with_unit(mut self, unit: LengthUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_oversize(mut self, oversize: OversizePolicy) -> Self {
        self.oversize = oversize;
        self
    }
}

/// 文本片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 序号，从 0 开始连续递增
    pub index: usize,
    /// 片段文本（原文切片，内部空白保持原样）
    pub text: String,
    /// 在原文中的字节区间
    pub span: Range<usize>,
}

/// 检查是否为句末标点
#[inline]
fn is_sentence_terminal(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '…' | '。' | '？' | '！')
}

/// 句末标点后允许跟随的闭合符号
#[inline]
fn is_closing_mark(ch: char) -> bool {
    matches!(
        ch,
        '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}' | '」' | '』' | '）'
    )
}

/// 单词是否以句末标点结束（忽略尾随的引号/括号）
fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(is_closing_mark)
        .chars()
        .next_back()
        .map_or(false, is_sentence_terminal)
}

/// 原文中的一个单词
#[derive(Debug, Clone, Copy)]
struct Word {
    start: usize,
    end: usize,
    /// 与前一个单词之间是段落分隔
    paragraph_break: bool,
}

/// 按空白扫描单词
fn scan_words(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    // 当前单词起点，以及它前面是否是段落分隔
    let mut start: Option<(usize, bool)> = None;
    let mut newlines = 0usize;

    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some((s, paragraph_break)) = start.take() {
                words.push(Word {
                    start: s,
                    end: i,
                    paragraph_break,
                });
                newlines = 0;
            }
            if ch == '\n' {
                newlines += 1;
            }
        } else if start.is_none() {
            start = Some((i, !words.is_empty() && newlines >= 2));
        }
    }

    if let Some((s, paragraph_break)) = start {
        words.push(Word {
            start: s,
            end: text.len(),
            paragraph_break,
        });
    }

    words
}

/// 把超长单词按字符边界硬切
fn hard_split(text: &str, span: Range<usize>, config: &SegmentConfig) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut piece_start = span.start;
    let mut units = 0usize;

    for (offset, ch) in text[span.clone()].char_indices() {
        let pos = span.start + offset;
        let width = match config.unit {
            LengthUnit::Chars => 1,
            LengthUnit::Bytes => ch.len_utf8(),
        };
        if units > 0 && units + width > config.max_len {
            pieces.push(piece_start..pos);
            piece_start = pos;
            units = 0;
        }
        units += width;
    }
    if piece_start < span.end {
        pieces.push(piece_start..span.end);
    }
    pieces
}

/// 第一个非空白字符的位置
fn skip_whitespace(text: &str, from: usize) -> usize {
    text[from..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(text.len(), |(i, _)| from + i)
}

/// 对文本进行分段
///
/// 相同的 `(text, config)` 总是得到相同的结果。
pub fn segment_text(text: &str, config: &SegmentConfig) -> Result<Vec<Segment>, SegmentError> {
    if config.max_len == 0 {
        return Err(SegmentError::InvalidMaxLength);
    }
    if text.trim().is_empty() {
        return Err(SegmentError::EmptyText);
    }

    let unit = config.unit;
    let max_len = config.max_len;
    let mut spans: Vec<Range<usize>> = Vec::new();
    // 当前片段区间，以及其中最后一个句末位置
    let mut current: Option<Range<usize>> = None;
    let mut sentence_end: Option<usize> = None;

    for word in scan_words(text) {
        let word_len = unit.measure(&text[word.start..word.end]);

        if word_len > max_len {
            if let Some(cur) = current.take() {
                spans.push(cur);
            }
            sentence_end = None;
            match config.oversize {
                OversizePolicy::Keep => spans.push(word.start..word.end),
                OversizePolicy::Split => {
                    spans.extend(hard_split(text, word.start..word.end, config))
                }
            }
            continue;
        }

        current = match current.take() {
            None => Some(word.start..word.end),
            Some(cur) if word.paragraph_break => {
                spans.push(cur);
                sentence_end = None;
                Some(word.start..word.end)
            }
            Some(cur) if unit.measure(&text[cur.start..word.end]) <= max_len => {
                Some(cur.start..word.end)
            }
            Some(cur) => {
                // 放不下：优先在后半部分的句末切分
                let preferred = sentence_end.filter(|&b| {
                    b < cur.end && unit.measure(&text[cur.start..b]) * 2 >= max_len
                });
                match preferred {
                    Some(b) => {
                        let rest = skip_whitespace(text, b);
                        if unit.measure(&text[rest..word.end]) <= max_len {
                            spans.push(cur.start..b);
                            // b 是 cur 中最后一个句末，带过去的部分不含句末
                            sentence_end = None;
                            Some(rest..word.end)
                        } else {
                            spans.push(cur);
                            sentence_end = None;
                            Some(word.start..word.end)
                        }
                    }
                    None => {
                        spans.push(cur);
                        sentence_end = None;
                        Some(word.start..word.end)
                    }
                }
            }
        };

        if ends_sentence(&text[word.start..word.end]) {
            sentence_end = Some(word.end);
        }
    }

    if let Some(cur) = current {
        spans.push(cur);
    }

    Ok(spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| Segment {
            index,
            text: text[span.clone()].to_string(),
            span,
        })
        .collect())
}

/// 用原始分隔符把片段重新拼接
pub fn reconstruct(source: &str, segments: &[Segment]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut prev_end: Option<usize> = None;
    for seg in segments {
        if let Some(end) = prev_end {
            out.push_str(&source[end..seg.span.start]);
        }
        out.push_str(&seg.text);
        prev_end = Some(seg.span.end);
    }
    out
}
