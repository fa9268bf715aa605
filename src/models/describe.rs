use regex::Regex;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// CloudFormation query API envelope for DescribeStacks. Only the status
/// leaf matters; everything else in the reply is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksResponse {
    describe_stacks_result: DescribeStacksResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksResult {
    stacks: StackList,
}

#[derive(Debug, Deserialize)]
struct StackList {
    #[serde(rename = "member", default)]
    members: Vec<StackMember>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackMember {
    stack_status: String,
}

/// Pulls the StackStatus leaf out of a DescribeStacks reply body.
pub fn extract_stack_status(body: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(body)
        .map_err(|e| AppError::MalformedReply(format!("reply is not UTF-8: {}", e)))?;

    let reply: DescribeStacksResponse = quick_xml::de::from_str(text).map_err(|e| {
        AppError::MalformedReply(format!("can't parse DescribeStacks reply: {}", e))
    })?;

    reply
        .describe_stacks_result
        .stacks
        .members
        .into_iter()
        .next()
        .map(|member| member.stack_status)
        .ok_or_else(|| AppError::MalformedReply("DescribeStacks reply has no stacks".to_string()))
}

/// Replaces every StackStatus element in the reply with `status`, leaving
/// the surrounding bytes untouched.
pub fn rewrite_stack_status(body: &[u8], status: &str) -> Vec<u8> {
    let Ok(pattern) = Regex::new("<StackStatus>[^<]*</StackStatus>") else {
        return body.to_vec();
    };

    let text = String::from_utf8_lossy(body);
    let injected = format!("<StackStatus>{}</StackStatus>", status);
    pattern
        .replace_all(&text, injected.as_str())
        .into_owned()
        .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe_reply(status: &str) -> String {
        format!(
            r#"<DescribeStacksResponse xmlns="http://cloudformation.amazonaws.com/doc/2010-05-15/">
  <DescribeStacksResult>
    <Stacks>
      <member>
        <StackName>orders-api</StackName>
        <CreationTime>2023-05-11T19:08:53.191Z</CreationTime>
        <StackStatus>{}</StackStatus>
        <DisableRollback>false</DisableRollback>
      </member>
    </Stacks>
  </DescribeStacksResult>
  <ResponseMetadata>
    <RequestId>b9b4b068-3a41-11e5-94eb-example</RequestId>
  </ResponseMetadata>
</DescribeStacksResponse>"#,
            status
        )
    }

    #[test]
    fn extracts_the_status_leaf() {
        let body = describe_reply("UPDATE_IN_PROGRESS");
        let status = extract_stack_status(body.as_bytes()).unwrap();
        assert_eq!(status, "UPDATE_IN_PROGRESS");
    }

    #[test]
    fn garbage_is_a_malformed_reply() {
        let err = extract_stack_status(b"not xml at all").unwrap_err();
        assert!(matches!(err, AppError::MalformedReply(_)));
    }

    #[test]
    fn an_envelope_without_stacks_is_a_malformed_reply() {
        let body = r#"<DescribeStacksResponse>
  <DescribeStacksResult>
    <Stacks></Stacks>
  </DescribeStacksResult>
</DescribeStacksResponse>"#;
        let err = extract_stack_status(body.as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::MalformedReply(_)));
    }

    #[test]
    fn rewrite_forges_the_status_and_keeps_the_rest() {
        let body = describe_reply("UPDATE_ROLLBACK_FAILED");
        let rewritten = rewrite_stack_status(body.as_bytes(), "CREATE_COMPLETE");
        let rewritten = String::from_utf8(rewritten).unwrap();

        assert!(rewritten.contains("<StackStatus>CREATE_COMPLETE</StackStatus>"));
        assert!(!rewritten.contains("UPDATE_ROLLBACK_FAILED"));
        assert!(rewritten.contains("<StackName>orders-api</StackName>"));
        assert!(rewritten.contains("<RequestId>b9b4b068-3a41-11e5-94eb-example</RequestId>"));
    }

    #[test]
    fn rewrite_replaces_every_occurrence() {
        let body = "<StackStatus>A</StackStatus><Other>x</Other><StackStatus>B</StackStatus>";
        let rewritten = rewrite_stack_status(body.as_bytes(), "UPDATE_COMPLETE");
        assert_eq!(
            String::from_utf8(rewritten).unwrap(),
            "<StackStatus>UPDATE_COMPLETE</StackStatus><Other>x</Other><StackStatus>UPDATE_COMPLETE</StackStatus>"
        );
    }

    #[test]
    fn rewrite_without_a_status_element_is_a_pass_through() {
        let body = b"<ErrorResponse><Error>Throttling</Error></ErrorResponse>";
        assert_eq!(rewrite_stack_status(body, "CREATE_COMPLETE"), body.to_vec());
    }
}
