//! clair-scanner 텍스트 리포트 파서
//!
//! clair-scanner는 취약점을 ASCII 테이블로 출력합니다. 발견 행은
//! 승인 상태 열이 `Approved` 또는 `Unapproved`이고, 이어서
//! `<심각도> <CVE 번호>`, 패키지 이름, 패키지 버전, CVE 설명 링크
//! 열이 옵니다:
//!
//! ```text
//! | Unapproved | High CVE-2017-8804 | glibc | 2.24-11+deb9u1 | https://security-tracker.debian.org/... |
//! ```
//!
//! 열 구분자는 ` | ` 고정입니다. 구분자 수가 달라지면 clair-scanner의
//! 출력 형식이 바뀐 것이므로 조용히 건너뛰지 않고 에러로 승격합니다.

use tracing::warn;

use dockhound_core::types::{ScanFinding, Severity};

use crate::error::ClairError;

/// 리포트 전체를 파싱하여 발견 목록을 반환합니다.
///
/// 발견 행이 하나도 없는 리포트는 취약점이 없는 이미지이므로 빈
/// 목록을 반환합니다. 완전히 빈 출력은 스캐너가 비정상 종료한
/// 것으로 보고 에러를 반환합니다.
///
/// # Errors
///
/// - `ClairError::MalformedOutput`: 빈 출력 또는 형식이 깨진 발견 행
pub fn parse_report(output: &str) -> Result<Vec<ScanFinding>, ClairError> {
    if output.trim().is_empty() {
        return Err(ClairError::MalformedOutput(
            "scanner produced no output".to_owned(),
        ));
    }

    let mut findings = Vec::new();
    for line in output.lines() {
        if line.contains("Unapproved") || line.contains("Approved") {
            findings.push(parse_row(line)?);
        }
    }
    Ok(findings)
}

/// 발견 행 하나를 파싱합니다.
///
/// ` | `로 나눈 뒤 양끝(승인 상태, CVE 설명 링크)을 버리면 세 열이
/// 남아야 합니다: `심각도 + CVE 번호`, 패키지 이름, 패키지 버전.
fn parse_row(line: &str) -> Result<ScanFinding, ClairError> {
    let columns: Vec<&str> = line.split(" | ").collect();
    let info = match columns.as_slice() {
        [_status, info @ .., _description] if info.len() == 3 => info,
        _ => {
            warn!(row = line, "vulnerability row has unexpected column count");
            return Err(ClairError::MalformedOutput(format!(
                "expected 5 columns separated by ' | ', got {}",
                columns.len()
            )));
        }
    };

    let mut detail = info[0].trim().split_whitespace();
    let severity = detail
        .next()
        .map(Severity::from_str_loose)
        .unwrap_or_default();
    let cve = detail.next().ok_or_else(|| {
        ClairError::MalformedOutput(format!("missing CVE number in row: {line}"))
    })?;

    Ok(ScanFinding {
        cve: cve.to_owned(),
        cwe: None,
        severity,
        package_name: info[1].trim().to_owned(),
        package_version: info[2].trim().to_owned(),
    })
}
