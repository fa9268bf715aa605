/// The two provisioning actions the relay understands. Everything else is
/// proxied verbatim and otherwise ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateChangeSet,
    DescribeStacks,
    Other,
}

#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub action: Action,
    pub stack_name: Option<String>,
    pub is_create: bool,
}

/// Classifies a form-encoded request body. Values are taken as-is, without
/// URL decoding, matching what the CloudFormation query API puts on the
/// wire. Pair order does not matter.
pub fn classify(body: &str) -> ProvisionRequest {
    let action = if body.contains("Action=CreateChangeSet&") {
        Action::CreateChangeSet
    } else if body.contains("Action=DescribeStacks&") {
        Action::DescribeStacks
    } else {
        Action::Other
    };

    let mut stack_name = None;
    let mut is_create = false;
    for pair in body.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "StackName" => stack_name = Some(value.to_string()),
            "ChangeSetType" => is_create = value == "CREATE",
            _ => {}
        }
    }

    ProvisionRequest {
        action,
        stack_name,
        is_create,
    }
}
