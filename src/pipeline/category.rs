//! Service label to NETMON protocol category mapping.
//!
//! Lookup is an exact match on the Cost Explorer service label. Anything not in
//! the table resolves to [`FALLBACK`], so the mapping is total over all strings.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;

/// Category assigned to a billing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryInfo {
    pub code: Cow<'static, str>,
    pub name: Cow<'static, str>,
    pub category: Cow<'static, str>,
    pub is_fallback: bool,
}

impl CategoryInfo {
    pub const fn new(code: &'static str, name: &'static str, category: &'static str) -> Self {
        Self {
            code: Cow::Borrowed(code),
            name: Cow::Borrowed(name),
            category: Cow::Borrowed(category),
            is_fallback: false,
        }
    }

    pub fn owned(
        code: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            code: Cow::Owned(code.into()),
            name: Cow::Owned(name.into()),
            category: Cow::Owned(category.into()),
            is_fallback: false,
        }
    }
}

/// The single entry returned for labels absent from the table.
pub static FALLBACK: CategoryInfo = CategoryInfo {
    code: Cow::Borrowed("199"),
    name: Cow::Borrowed("OTHER"),
    category: Cow::Borrowed("Other"),
    is_fallback: true,
};

const EC2: CategoryInfo = CategoryInfo::new("100", "AWS_EC2", "Compute");
const S3: CategoryInfo = CategoryInfo::new("101", "AWS_S3", "Storage");
const RDS: CategoryInfo = CategoryInfo::new("102", "AWS_RDS", "Database");
const DYNAMODB: CategoryInfo = CategoryInfo::new("103", "AWS_DynamoDB", "Database");
const LAMBDA: CategoryInfo = CategoryInfo::new("104", "AWS_Lambda", "Compute");
const CLOUDFRONT: CategoryInfo = CategoryInfo::new("105", "AWS_CloudFront", "CDN");
const ECS: CategoryInfo = CategoryInfo::new("106", "AWS_ECS", "Compute");
const EKS: CategoryInfo = CategoryInfo::new("107", "AWS_EKS", "Compute");
const ELASTICACHE: CategoryInfo = CategoryInfo::new("108", "AWS_ElastiCache", "Cache");
const VPC: CategoryInfo = CategoryInfo::new("109", "AWS_VPC", "Network");
const ROUTE53: CategoryInfo = CategoryInfo::new("110", "AWS_Route53", "DNS");
const CONFIG: CategoryInfo = CategoryInfo::new("111", "AWS_Config", "Management");
const CLOUDWATCH: CategoryInfo = CategoryInfo::new("112", "AWS_CloudWatch", "Monitoring");
const SNS: CategoryInfo = CategoryInfo::new("113", "AWS_SNS", "Messaging");
const SQS: CategoryInfo = CategoryInfo::new("114", "AWS_SQS", "Messaging");
const KINESIS: CategoryInfo = CategoryInfo::new("115", "AWS_Kinesis", "Streaming");
const KMS: CategoryInfo = CategoryInfo::new("116", "AWS_KMS", "Security");

/// Default table. Long labels are what Cost Explorer returns for the SERVICE
/// dimension; short aliases cover older reports and hand-written fixtures.
static DEFAULT_ENTRIES: &[(&str, CategoryInfo)] = &[
    ("Amazon Elastic Compute Cloud - Compute", EC2),
    ("EC2 - Other", EC2),
    ("Amazon EC2", EC2),
    ("Amazon Simple Storage Service", S3),
    ("Amazon S3", S3),
    ("Amazon Relational Database Service", RDS),
    ("Amazon RDS", RDS),
    ("Amazon DynamoDB", DYNAMODB),
    ("AWS Lambda", LAMBDA),
    ("Amazon CloudFront", CLOUDFRONT),
    ("Amazon Elastic Container Service", ECS),
    ("Amazon Elastic Container Service for Kubernetes", EKS),
    ("Amazon Elastic Kubernetes Service", EKS),
    ("Amazon ElastiCache", ELASTICACHE),
    ("Amazon Virtual Private Cloud", VPC),
    ("Amazon Route 53", ROUTE53),
    ("AWS Config", CONFIG),
    ("AmazonCloudWatch", CLOUDWATCH),
    ("Amazon CloudWatch", CLOUDWATCH),
    ("Amazon Simple Notification Service", SNS),
    ("Amazon SNS", SNS),
    ("Amazon Simple Queue Service", SQS),
    ("Amazon SQS", SQS),
    ("Amazon Kinesis", KINESIS),
    ("AWS Key Management Service", KMS),
];

/// Append-only registry of service label → category.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    entries: HashMap<String, CategoryInfo>,
}

impl CategoryRegistry {
    pub fn builder() -> CategoryRegistryBuilder {
        CategoryRegistryBuilder::new()
    }

    /// Exact-match lookup; never fails.
    pub fn lookup(&self, service: &str) -> &CategoryInfo {
        self.entries.get(service).unwrap_or(&FALLBACK)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        global_registry().clone()
    }
}

#[derive(Debug, Default)]
pub struct CategoryRegistryBuilder {
    entries: HashMap<String, CategoryInfo>,
}

impl CategoryRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(mut self) -> Self {
        for (label, info) in DEFAULT_ENTRIES {
            self.entries.insert((*label).to_string(), info.clone());
        }
        self
    }

    /// Adds or replaces a mapping. The fallback flag is always cleared: the
    /// only fallback is [`FALLBACK`].
    pub fn service(mut self, label: impl Into<String>, mut info: CategoryInfo) -> Self {
        info.is_fallback = false;
        self.entries.insert(label.into(), info);
        self
    }

    pub fn build(self) -> CategoryRegistry {
        CategoryRegistry {
            entries: self.entries,
        }
    }
}

static GLOBAL_REGISTRY: LazyLock<CategoryRegistry> =
    LazyLock::new(|| CategoryRegistryBuilder::new().with_defaults().build());

pub fn global_registry() -> &'static CategoryRegistry {
    &GLOBAL_REGISTRY
}

/// Looks up `service` in the default registry.
pub fn lookup(service: &str) -> &'static CategoryInfo {
    global_registry().lookup(service)
}
