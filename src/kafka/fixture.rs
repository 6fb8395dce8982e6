use crate::error::Result;
use crate::kafka::{ConsumerGroupSource, parse_group_list};

pub const FIXTURE_GROUP: &str = "MongoInserter";

pub const FIXTURE_GROUP_LIST: &str = "\
MongoInserter
ProductHealthDFAGroup
syntheticengine_wafpsymsyn03
MessageExtractor_Perf_SaaS
ProductHealthConsumerGroup
syntheticengine_wafpsymsyn01
HARSplitter
SyntheticEngine
DynamicAnomalyEngine2
syntheticengine_wafpsymsyn02
";

pub const FIXTURE_DESCRIBE_OUTPUT: &str = "\
GROUP                          TOPIC                          PARTITION  CURRENT-OFFSET  LOG-END-OFFSET  LAG             OWNER
MongoInserter                  perf_db_dt_wa_raw_5_reload     0          unknown         0               unknown         consumer-4_/10.200.200.112
MongoInserter                  perf_db_dt_wa_raw_5_reload     1          unknown         0               unknown         consumer-4_/10.200.200.112
MongoInserter                  perf_db_dt_wa_raw_5_reload     2          unknown         0               unknown         consumer-4_/10.200.200.112
MongoInserter                  perf_db_dt_wa_raw_5            3          40349111        40349113        2               consumer-3_/10.200.200.112
MongoInserter                  perf_db_dt_wa_raw_5            4          40026469        40026470        1               consumer-3_/10.200.200.112
MongoInserter                  perf_db_dt_wa_raw_5            5          45489131        45489132        1               consumer-3_/10.200.200.112
MongoInserter                  updatedb                       3          unknown         0               unknown         consumer-1_/10.200.200.113
MongoInserter                  updatedb                       4          unknown         0               unknown         consumer-1_/10.200.200.113
MongoInserter                  updatedb                       5          unknown         0               unknown         consumer-1_/10.200.200.113
MongoInserter                  synth_error                    3          unknown         0               unknown         consumer-2_/10.200.200.112
MongoInserter                  synth_error                    4          unknown         0               unknown         consumer-2_/10.200.200.112
MongoInserter                  synth_error                    5          unknown         0               unknown         consumer-2_/10.200.200.112
MongoInserter                  perf_db_dt_wa_raw_5            0          35253984        35253997        13              consumer-3_/10.200.200.113
MongoInserter                  perf_db_dt_wa_raw_5            1          74039511        74039511        0               consumer-3_/10.200.200.113
MongoInserter                  perf_db_dt_wa_raw_5            2          60308560        60308567        7               consumer-3_/10.200.200.113
MongoInserter                  perf_db_dt_wa_raw_5_reload     3          unknown         0               unknown         consumer-4_/10.200.200.113
MongoInserter                  perf_db_dt_wa_raw_5_reload     4          unknown         0               unknown         consumer-4_/10.200.200.113
MongoInserter                  perf_db_dt_wa_raw_5_reload     5          unknown         0               unknown         consumer-4_/10.200.200.113
MongoInserter                  synth_error                    0          6932623         6932623         0               consumer-2_/10.200.200.113
MongoInserter                  synth_error                    1          unknown         0               unknown         consumer-2_/10.200.200.113
MongoInserter                  synth_error                    2          unknown         0               unknown         consumer-2_/10.200.200.113
MongoInserter                  updatedb                       0          unknown         0               unknown         consumer-1_/10.200.200.112
MongoInserter                  updatedb                       1          unknown         0               unknown         consumer-1_/10.200.200.112
MongoInserter                  updatedb                       2          unknown         0               unknown         consumer-1_/10.200.200.112
";

/// Canned listing and describe output used in development mode.
#[derive(Debug, Default)]
pub struct FixtureGroupSource;

impl FixtureGroupSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ConsumerGroupSource for FixtureGroupSource {
    async fn list_groups(&self) -> Result<Vec<String>> {
        Ok(parse_group_list(FIXTURE_GROUP_LIST))
    }

    async fn describe_group(&self, group: &str) -> Result<String> {
        Ok(FIXTURE_DESCRIBE_OUTPUT.replace(FIXTURE_GROUP, group))
    }
}
