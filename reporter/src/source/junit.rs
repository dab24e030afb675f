use super::{read_report, ResultSource, SourceError, SourceResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use run_client::{OutcomeStatus, TestOutcome};
use std::path::{Path, PathBuf};

/// Reads JUnit/XUnit XML as written by pytest `--junitxml` and most runners.
#[derive(Debug, Clone)]
pub struct JunitReportSource {
    path: PathBuf,
    property_keys: Vec<String>,
}

struct CaseBuilder {
    name: String,
    status: OutcomeStatus,
    annotation: Option<String>,
}

impl CaseBuilder {
    fn from_element(element: &BytesStart<'_>) -> SourceResult<Self> {
        let name = attribute(element, "name")?
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| SourceError::Malformed {
                message: "<testcase> without a name attribute".to_string(),
            })?;

        Ok(Self {
            name,
            status: OutcomeStatus::Passed,
            annotation: None,
        })
    }

    fn mark_failed(&mut self) {
        self.status = OutcomeStatus::Failed;
    }

    fn mark_skipped(&mut self) {
        if self.status != OutcomeStatus::Failed {
            self.status = OutcomeStatus::Skipped;
        }
    }

    fn property(&mut self, element: &BytesStart<'_>, keys: &[String]) -> SourceResult<()> {
        if self.annotation.is_some() {
            return Ok(());
        }
        let Some(name) = attribute(element, "name")? else {
            return Ok(());
        };
        if keys.iter().any(|key| *key == name) {
            self.annotation = attribute(element, "value")?.filter(|v| !v.trim().is_empty());
        }
        Ok(())
    }

    fn finish(self) -> TestOutcome {
        TestOutcome {
            name: self.name,
            status: self.status,
            annotation: self.annotation,
        }
    }
}

fn attribute(element: &BytesStart<'_>, key: &str) -> SourceResult<Option<String>> {
    match element.try_get_attribute(key)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

impl JunitReportSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            property_keys: vec!["externalId".to_string()],
        }
    }

    pub fn with_property_keys(mut self, keys: Vec<String>) -> Self {
        self.property_keys = keys;
        self
    }

    pub fn parse(xml: &str, property_keys: &[String]) -> SourceResult<Vec<TestOutcome>> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut outcomes = Vec::new();
        let mut current: Option<CaseBuilder> = None;

        loop {
            match reader.read_event()? {
                Event::Start(element) => match element.name().as_ref() {
                    b"testcase" => {
                        if current.is_some() {
                            return Err(SourceError::Malformed {
                                message: "nested <testcase> elements".to_string(),
                            });
                        }
                        current = Some(CaseBuilder::from_element(&element)?);
                    }
                    b"failure" | b"error" => {
                        if let Some(case) = current.as_mut() {
                            case.mark_failed();
                        }
                    }
                    b"skipped" => {
                        if let Some(case) = current.as_mut() {
                            case.mark_skipped();
                        }
                    }
                    _ => {}
                },
                Event::Empty(element) => match element.name().as_ref() {
                    b"testcase" => {
                        outcomes.push(CaseBuilder::from_element(&element)?.finish());
                    }
                    b"failure" | b"error" => {
                        if let Some(case) = current.as_mut() {
                            case.mark_failed();
                        }
                    }
                    b"skipped" => {
                        if let Some(case) = current.as_mut() {
                            case.mark_skipped();
                        }
                    }
                    b"property" => {
                        // suite-level properties have no current case and are ignored
                        if let Some(case) = current.as_mut() {
                            case.property(&element, property_keys)?;
                        }
                    }
                    _ => {}
                },
                Event::End(element) if element.name().as_ref() == b"testcase" => {
                    if let Some(case) = current.take() {
                        outcomes.push(case.finish());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if current.is_some() {
            return Err(SourceError::Malformed {
                message: "unterminated <testcase> element".to_string(),
            });
        }

        Ok(outcomes)
    }
}

impl ResultSource for JunitReportSource {
    fn outcomes(&self) -> SourceResult<Vec<TestOutcome>> {
        let xml = read_report(&self.path)?;
        Self::parse(&xml, &self.property_keys)
    }

    fn describe(&self) -> String {
        format!("JUnit report {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTEST_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<testsuites>
  <testsuite name="pytest" errors="0" failures="1" skipped="1" tests="5">
    <properties>
      <property name="externalId" value="SUITE-LEVEL"/>
    </properties>
    <testcase classname="tests.test_login" name="test_valid_login[admin-admin123]" time="0.001">
      <properties>
        <property name="externalId" value="TC-40"/>
      </properties>
    </testcase>
    <testcase classname="tests.test_login" name="test_force_fail[wrongpass]" time="0.002">
      <properties>
        <property name="owner" value="qa"/>
        <property name="externalId" value="TC-42"/>
      </properties>
      <failure message="AssertionError">assert &apos;wrongpass&apos; == &apos;uzipass&apos;</failure>
    </testcase>
    <testcase classname="tests.test_login" name="test_skipped">
      <skipped type="pytest.skip" message="not today"/>
    </testcase>
    <testcase classname="tests.test_login" name="test_errored">
      <error message="fixture blew up"/>
    </testcase>
    <testcase classname="tests.test_login" name="test_force_pass[uzipass]" time="0.001"/>
  </testsuite>
</testsuites>"#;

    fn keys() -> Vec<String> {
        vec!["externalId".to_string()]
    }

    #[test]
    fn test_parse_pytest_report() {
        let outcomes = JunitReportSource::parse(PYTEST_XML, &keys()).unwrap();
        assert_eq!(
            outcomes,
            vec![
                TestOutcome::passed("test_valid_login[admin-admin123]").with_annotation("TC-40"),
                TestOutcome::failed("test_force_fail[wrongpass]").with_annotation("TC-42"),
                TestOutcome::skipped("test_skipped"),
                TestOutcome::failed("test_errored"),
                TestOutcome::passed("test_force_pass[uzipass]"),
            ]
        );
    }

    #[test]
    fn test_custom_property_key() {
        let xml = r#"<testsuite>
            <testcase name="test_a">
              <properties><property name="testinyId" value="TC-7"/></properties>
            </testcase>
        </testsuite>"#;
        let outcomes = JunitReportSource::parse(xml, &keys()).unwrap();
        assert_eq!(outcomes[0].annotation, None);

        let outcomes = JunitReportSource::parse(xml, &["testinyId".to_string()]).unwrap();
        assert_eq!(outcomes[0].annotation.as_deref(), Some("TC-7"));
    }

    #[test]
    fn test_failure_beats_skip() {
        let xml = r#"<testsuite>
            <testcase name="test_a"><failure/><skipped/></testcase>
            <testcase name="test_b"><skipped>reason</skipped></testcase>
        </testsuite>"#;
        let outcomes = JunitReportSource::parse(xml, &keys()).unwrap();
        assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(outcomes[1].status, OutcomeStatus::Skipped);
    }

    #[test]
    fn test_escaped_names() {
        let xml = r#"<testsuite><testcase name="test_cmp[a&lt;b]"/></testsuite>"#;
        let outcomes = JunitReportSource::parse(xml, &keys()).unwrap();
        assert_eq!(outcomes[0].name, "test_cmp[a<b]");
    }

    #[test]
    fn test_malformed_reports() {
        assert!(matches!(
            JunitReportSource::parse(r#"<testsuite><testcase classname="x"/></testsuite>"#, &keys()),
            Err(SourceError::Malformed { .. })
        ));
        assert!(matches!(
            JunitReportSource::parse(r#"<testsuite><testcase name="a">"#, &keys()),
            Err(SourceError::Malformed { .. }) | Err(SourceError::Xml(_))
        ));
        assert!(JunitReportSource::parse("<testsuite></wrong>", &keys()).is_err());
    }

    #[test]
    fn test_empty_suite() {
        let outcomes = JunitReportSource::parse("<testsuites/>", &keys()).unwrap();
        assert!(outcomes.is_empty());
    }
}
